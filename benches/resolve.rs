#![allow(dead_code)]

use castellan::{Component, Container, Inject, InstantiateErrorKind, Lifestyle, ServiceType, TypeDef};
use criterion::{criterion_group, criterion_main, Criterion};
use std::sync::Arc;

struct A(Arc<B>, Arc<C>);
struct B(i32);
struct C(Arc<CA>);
struct CA(Arc<CAA>);
struct CAA(Arc<CAAA>);
struct CAAA;

struct Cache;

fn configured<I: Send + Sync + 'static>(component: Component<I>, lifestyle: &Lifestyle, finalizers: bool) -> Component<I> {
    let component = component.expose_self().lifestyle(lifestyle.clone());
    if finalizers {
        component.on_destroy(|_| Ok(()))
    } else {
        component
    }
}

#[inline]
fn container_with_graph(lifestyle: Lifestyle, finalizers: bool) -> Container {
    let container = Container::new();
    container
        .register(configured(Component::<CAAA>::new(), &lifestyle, finalizers).activator(|_| Ok(CAAA)))
        .unwrap();
    container
        .register(
            configured(Component::<CAA>::new(), &lifestyle, finalizers)
                .factory(|Inject(caaa): Inject<CAAA>| Ok::<_, InstantiateErrorKind>(CAA(caaa))),
        )
        .unwrap();
    container
        .register(
            configured(Component::<CA>::new(), &lifestyle, finalizers)
                .factory(|Inject(caa): Inject<CAA>| Ok::<_, InstantiateErrorKind>(CA(caa))),
        )
        .unwrap();
    container
        .register(
            configured(Component::<C>::new(), &lifestyle, finalizers)
                .factory(|Inject(ca): Inject<CA>| Ok::<_, InstantiateErrorKind>(C(ca))),
        )
        .unwrap();
    container
        .register(configured(Component::<B>::new(), &lifestyle, finalizers).activator(|_| Ok(B(2))))
        .unwrap();
    container
        .register(
            configured(Component::<A>::new(), &lifestyle, finalizers)
                .factory(|Inject(b): Inject<B>, Inject(c): Inject<C>| Ok::<_, InstantiateErrorKind>(A(b, c))),
        )
        .unwrap();
    container
}

#[inline]
fn resolve_and_release(container: &Container) {
    let a = container.resolve::<A>().unwrap();
    container.release(&a).unwrap();
}

#[inline]
fn scope_resolve(container: &Container) {
    let scope = container.begin_scope();
    let _ = scope.resolve::<A>().unwrap();
}

fn criterion_benchmark(c: &mut Criterion) {
    let transient = container_with_graph(Lifestyle::Transient, false);
    let transient_with_finalizers = container_with_graph(Lifestyle::Transient, true);
    let singleton = container_with_graph(Lifestyle::Singleton, false);
    let scoped = container_with_graph(Lifestyle::Scoped(None), true);

    let cache = TypeDef::class("Cache").param("T").build();
    let generic = Container::new();
    generic
        .register(
            Component::<Cache>::generic(&cache)
                .expose_self()
                .transient()
                .activator(|_| Ok(Cache)),
        )
        .unwrap();
    let closed = ServiceType::generic(&cache, [ServiceType::value::<i32>()]);

    c.bench_function("container_new_with_graph", |b| {
        b.iter(|| container_with_graph(Lifestyle::Transient, true))
    })
    .bench_function("container_resolve_transient", |b| b.iter(|| resolve_and_release(&transient)))
    .bench_function("container_resolve_transient_with_finalizers", |b| {
        b.iter(|| resolve_and_release(&transient_with_finalizers))
    })
    .bench_function("container_resolve_singleton", |b| b.iter(|| resolve_and_release(&singleton)))
    .bench_function("container_resolve_scoped", |b| b.iter(|| scope_resolve(&scoped)))
    .bench_function("container_resolve_closed_generic", |b| {
        b.iter(|| {
            let instance = generic.resolve_service(&closed).unwrap();
            generic.release_instance(&instance).unwrap();
        })
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
