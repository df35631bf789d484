use castellan::{
    Binder, BindingTarget, Component, Container, Inject, InstantiateErrorKind, LifestyleErrorKind, ResolveErrorKind, ScopeAccessor,
    ScopeFrame,
};

use parking_lot::Mutex;
use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        mpsc, Arc, OnceLock,
    },
    time::Duration,
};
use tracing_test::traced_test;

#[derive(Debug)]
struct Session;

fn scoped_container(destroyed: &Arc<AtomicUsize>) -> Container {
    let destroyed = destroyed.clone();
    let container = Container::new();
    container
        .register(
            Component::<Session>::new()
                .named("session")
                .expose_self()
                .scoped()
                .activator(|_| Ok(Session))
                .on_destroy(move |_| {
                    destroyed.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }),
        )
        .unwrap();
    container
}

#[test]
#[traced_test]
fn test_same_instance_within_scope_distinct_across() {
    let destroyed = Arc::new(AtomicUsize::new(0));
    let container = scoped_container(&destroyed);

    let first = container.begin_scope();
    let second = container.begin_scope();

    let a = first.resolve::<Session>().unwrap();
    let b = second.resolve::<Session>().unwrap();

    assert!(Arc::ptr_eq(&a, &first.resolve::<Session>().unwrap()));
    assert!(!Arc::ptr_eq(&a, &b));
    assert_eq!(first.frame().len(), 1);

    // Explicit release while the scope is active is a no-op
    container.release(&a).unwrap();
    assert!(!container.has_track(&a));
    assert_eq!(destroyed.load(Ordering::SeqCst), 0);
    assert!(Arc::ptr_eq(&a, &first.resolve::<Session>().unwrap()));
    assert_eq!(first.frame().len(), 1);

    drop(first);
    assert_eq!(destroyed.load(Ordering::SeqCst), 1);

    second.end().unwrap();
    assert_eq!(destroyed.load(Ordering::SeqCst), 2);
}

#[test]
#[traced_test]
fn test_concurrent_scopes_are_isolated() {
    let destroyed = Arc::new(AtomicUsize::new(0));
    let container = scoped_container(&destroyed);

    let sessions: Vec<Arc<Session>> = std::thread::scope(|threads| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                threads.spawn(|| {
                    let scope = container.begin_scope();
                    let session = scope.resolve::<Session>().unwrap();
                    assert!(Arc::ptr_eq(&session, &scope.resolve::<Session>().unwrap()));
                    session
                })
            })
            .collect();
        handles.into_iter().map(|handle| handle.join().unwrap()).collect()
    });

    for (index, session) in sessions.iter().enumerate() {
        for other in &sessions[index + 1..] {
            assert!(!Arc::ptr_eq(session, other));
        }
    }
    assert_eq!(destroyed.load(Ordering::SeqCst), 4);
}

#[test]
#[traced_test]
fn test_nested_scope_binds_to_innermost_frame() {
    let destroyed = Arc::new(AtomicUsize::new(0));
    let container = scoped_container(&destroyed);

    let outer = container.begin_scope();
    let outer_session = outer.resolve::<Session>().unwrap();
    {
        let inner = outer.begin_scope();
        assert_eq!(inner.frame().depth(), 1);
        assert_eq!(inner.frame().parent().map(|parent| parent.id()), Some(outer.frame().id()));

        let inner_session = inner.resolve::<Session>().unwrap();
        assert!(!Arc::ptr_eq(&outer_session, &inner_session));
        assert!(outer.frame().len() == 1 && inner.frame().len() == 1);
    }

    assert_eq!(destroyed.load(Ordering::SeqCst), 1);
    assert!(!outer.frame().is_ended());
    assert!(Arc::ptr_eq(&outer_session, &outer.resolve::<Session>().unwrap()));
}

#[test]
#[traced_test]
fn test_scoped_without_scope_fails_with_actionable_error() {
    let destroyed = Arc::new(AtomicUsize::new(0));
    let container = scoped_container(&destroyed);

    let err = container.resolve::<Session>().unwrap_err();

    assert!(matches!(err, ResolveErrorKind::Lifestyle(LifestyleErrorKind::NoScope { .. })));
    assert!(err.to_string().contains("Begin a scope"));
}

#[derive(Default)]
struct Pinned(Mutex<Option<Arc<ScopeFrame>>>);

impl ScopeAccessor for Pinned {
    fn current(&self) -> Option<Arc<ScopeFrame>> {
        self.0.lock().clone()
    }
}

#[test]
#[traced_test]
fn test_custom_accessor_and_ended_scope() {
    let accessor = Arc::new(Pinned::default());
    let container = Container::new();
    container
        .register(
            Component::<Session>::new()
                .expose_self()
                .scoped_with(accessor.clone())
                .activator(|_| Ok(Session)),
        )
        .unwrap();

    let scope = container.begin_scope();
    *accessor.0.lock() = Some(scope.frame().clone());

    // Resolved through the container, cached in the pinned frame
    let session = container.resolve::<Session>().unwrap();
    assert!(Arc::ptr_eq(&session, &scope.resolve::<Session>().unwrap()));
    assert_eq!(scope.frame().len(), 1);

    scope.end().unwrap();
    let err = container.resolve::<Session>().unwrap_err();
    assert!(matches!(err, ResolveErrorKind::Lifestyle(LifestyleErrorKind::ScopeEnded { .. })));
}

#[derive(Debug)]
struct UnitOfWork;

struct Orders {
    work: Arc<UnitOfWork>,
}

struct Invoices {
    work: Arc<UnitOfWork>,
}

struct Checkout {
    orders: Arc<Orders>,
    invoices: Arc<Invoices>,
}

#[test]
#[traced_test]
fn test_bound_instance_shared_under_one_ancestor() {
    let destroyed = Arc::new(AtomicUsize::new(0));
    let container = Container::new();
    {
        let destroyed = destroyed.clone();
        container
            .register(
                Component::<UnitOfWork>::new()
                    .expose_self()
                    .bound_to(Binder::nearest(BindingTarget::service::<Checkout>()))
                    .activator(|_| Ok(UnitOfWork))
                    .on_destroy(move |_| {
                        destroyed.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    }),
            )
            .unwrap();
    }
    container
        .register(
            Component::<Orders>::new()
                .expose_self()
                .transient()
                .factory(|Inject(work): Inject<UnitOfWork>| Ok::<_, InstantiateErrorKind>(Orders { work })),
        )
        .unwrap();
    container
        .register(
            Component::<Invoices>::new()
                .expose_self()
                .transient()
                .factory(|Inject(work): Inject<UnitOfWork>| Ok::<_, InstantiateErrorKind>(Invoices { work })),
        )
        .unwrap();
    container
        .register(
            Component::<Checkout>::new()
                .expose_self()
                .transient()
                .factory(|Inject(orders): Inject<Orders>, Inject(invoices): Inject<Invoices>| {
                    Ok::<_, InstantiateErrorKind>(Checkout { orders, invoices })
                }),
        )
        .unwrap();

    let first = container.resolve::<Checkout>().unwrap();
    let second = container.resolve::<Checkout>().unwrap();

    assert!(Arc::ptr_eq(&first.orders.work, &first.invoices.work));
    assert!(!Arc::ptr_eq(&first.orders.work, &second.orders.work));

    container.release(&first).unwrap();
    assert_eq!(destroyed.load(Ordering::SeqCst), 1);

    let err = container.resolve::<UnitOfWork>().unwrap_err();
    assert!(matches!(err, ResolveErrorKind::Lifestyle(LifestyleErrorKind::NoBindingTarget { .. })));

    container.dispose().unwrap();
    assert_eq!(destroyed.load(Ordering::SeqCst), 2);
}

#[derive(Debug)]
struct Account {
    auditor: OnceLock<Arc<Auditor>>,
}

#[derive(Debug)]
struct Auditor {
    account: Arc<Account>,
}

fn account_container(scoped: bool) -> Container {
    let container = Container::new();
    let account = Component::<Account>::new()
        .named("account")
        .expose_self()
        .activator(|_| {
            Ok(Account {
                auditor: OnceLock::new(),
            })
        })
        .property("auditor", |account: &Account, auditor: Arc<Auditor>| {
            let _ = account.auditor.set(auditor);
        });
    let account = if scoped { account.scoped() } else { account.transient() };
    container.register(account).unwrap();
    container
        .register(
            Component::<Auditor>::new()
                .named("auditor")
                .expose_self()
                .transient()
                .factory(|Inject(account): Inject<Account>| Ok::<_, InstantiateErrorKind>(Auditor { account })),
        )
        .unwrap();
    container
}

#[test]
#[traced_test]
fn test_scoped_instance_under_construction_reused_by_its_property() {
    let container = account_container(true);
    let scope = container.begin_scope();

    let account = scope.resolve::<Account>().unwrap();
    let auditor = account.auditor.get().unwrap();

    assert!(Arc::ptr_eq(&account, &auditor.account));
}

#[test]
#[traced_test]
fn test_transient_self_reference_is_a_cycle() {
    let container = account_container(false);

    let err = container.resolve::<Account>().unwrap_err();
    let ResolveErrorKind::CircularDependency { chain, .. } = err.root_cause() else {
        panic!("expected a cycle, got {err}");
    };
    assert_eq!(chain, &["account", "auditor", "account"]);
}

struct SlowLoader;

struct RequestLog;

struct Settings {
    _loader: Arc<SlowLoader>,
    log: Arc<RequestLog>,
}

struct Endpoint {
    settings: Arc<Settings>,
}

#[test]
#[traced_test]
fn test_singleton_and_scoped_created_concurrently_in_one_scope() {
    let container = Container::new();
    container
        .register(Component::<SlowLoader>::new().expose_self().transient().activator(|_| {
            std::thread::sleep(Duration::from_millis(50));
            Ok(SlowLoader)
        }))
        .unwrap();
    container
        .register(Component::<RequestLog>::new().expose_self().scoped().activator(|_| Ok(RequestLog)))
        .unwrap();
    container
        .register(
            Component::<Settings>::new()
                .expose_self()
                .singleton()
                .factory(|Inject(loader): Inject<SlowLoader>, Inject(log): Inject<RequestLog>| {
                    Ok::<_, InstantiateErrorKind>(Settings { _loader: loader, log })
                }),
        )
        .unwrap();
    container
        .register(
            Component::<Endpoint>::new()
                .expose_self()
                .scoped()
                .factory(|Inject(settings): Inject<Settings>| Ok::<_, InstantiateErrorKind>(Endpoint { settings })),
        )
        .unwrap();

    // One thread holds the singleton while it waits for a scoped dependency,
    // the other creates a scoped component waiting for that singleton
    let scope = Arc::new(container.begin_scope());
    let (sender, receiver) = mpsc::channel();
    {
        let scope = scope.clone();
        let sender = sender.clone();
        std::thread::spawn(move || {
            let _ = sender.send(scope.resolve::<Settings>().map(|_| ()));
        });
    }
    {
        let scope = scope.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(10));
            let _ = sender.send(scope.resolve::<Endpoint>().map(|_| ()));
        });
    }

    for _ in 0..2 {
        let result = receiver.recv_timeout(Duration::from_secs(5)).expect("resolution didn't finish");
        assert!(result.is_ok());
    }
    let endpoint = scope.resolve::<Endpoint>().unwrap();
    assert!(Arc::ptr_eq(&endpoint.settings.log, &scope.resolve::<RequestLog>().unwrap()));
}
