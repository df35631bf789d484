use std::{any::type_name, borrow::Cow, sync::Arc};

use crate::{any::Instance, errors::InstantiateErrorKind, types::ServiceType};

/// A dependency value as handed to an activator.
#[derive(Clone)]
pub(crate) enum ResolvedValue {
    /// Resolved from a component. `view` is what the dependency's service sees.
    Service { instance: Instance, view: Instance },
    Value(Instance),
    Many(Vec<Instance>),
    Missing,
}

impl ResolvedValue {
    pub(crate) fn service<S: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<S>> {
        match self {
            ResolvedValue::Service { view, .. } | ResolvedValue::Value(view) => view.downcast_ref::<Arc<S>>().cloned(),
            ResolvedValue::Many(_) | ResolvedValue::Missing => None,
        }
    }

    pub(crate) fn is_missing(&self) -> bool {
        matches!(self, ResolvedValue::Missing)
    }
}

/// Resolved dependencies of the component being created.
pub struct Arguments {
    component: String,
    generic_arguments: Arc<[ServiceType]>,
    values: Vec<(Cow<'static, str>, ResolvedValue)>,
}

impl Arguments {
    pub(crate) fn new(component: String, generic_arguments: Arc<[ServiceType]>) -> Self {
        Self {
            component,
            generic_arguments,
            values: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, key: Cow<'static, str>, value: ResolvedValue) {
        self.values.push((key, value));
    }

    fn find(&self, key: &str) -> Option<&ResolvedValue> {
        self.values.iter().find(|(own, _)| own == key).map(|(_, value)| value)
    }

    fn required(&self, key: &str) -> Result<&ResolvedValue, InstantiateErrorKind> {
        match self.find(key) {
            Some(ResolvedValue::Missing) | None => Err(InstantiateErrorKind::MissingArgument { key: key.to_owned() }),
            Some(value) => Ok(value),
        }
    }

    /// Name of the component being created.
    #[inline]
    #[must_use]
    pub fn component(&self) -> &str {
        &self.component
    }

    /// # Errors
    /// - Returns [`InstantiateErrorKind::MissingArgument`] if nothing was resolved for `key`
    /// - Returns [`InstantiateErrorKind::IncorrectArgumentType`] if the value isn't an `S`
    pub fn get<S: ?Sized + Send + Sync + 'static>(&self, key: &str) -> Result<Arc<S>, InstantiateErrorKind> {
        self.required(key)?
            .service::<S>()
            .ok_or_else(|| InstantiateErrorKind::IncorrectArgumentType {
                key: key.to_owned(),
                expected: type_name::<S>(),
            })
    }

    /// Like [`Self::get`], but a dependency nothing could supply is `None`.
    ///
    /// # Errors
    /// Returns [`InstantiateErrorKind::IncorrectArgumentType`] if the value isn't an `S`
    pub fn optional<S: ?Sized + Send + Sync + 'static>(&self, key: &str) -> Result<Option<Arc<S>>, InstantiateErrorKind> {
        match self.find(key) {
            Some(ResolvedValue::Missing) | None => Ok(None),
            Some(_) => self.get(key).map(Some),
        }
    }

    /// Every instance of a collection dependency, in registration order.
    ///
    /// # Errors
    /// Returns [`InstantiateErrorKind::IncorrectArgumentType`] if `key` isn't a collection of `S`
    pub fn all<S: ?Sized + Send + Sync + 'static>(&self, key: &str) -> Result<Vec<Arc<S>>, InstantiateErrorKind> {
        let incorrect = || InstantiateErrorKind::IncorrectArgumentType {
            key: key.to_owned(),
            expected: type_name::<Vec<Arc<S>>>(),
        };
        match self.find(key) {
            Some(ResolvedValue::Many(views)) => views
                .iter()
                .map(|view| view.downcast_ref::<Arc<S>>().cloned().ok_or_else(incorrect))
                .collect(),
            Some(ResolvedValue::Missing) | None => Ok(Vec::new()),
            Some(_) => Err(incorrect()),
        }
    }

    /// Plain value of a parameter dependency.
    ///
    /// # Errors
    /// - Returns [`InstantiateErrorKind::MissingArgument`] if nothing was supplied for `key`
    /// - Returns [`InstantiateErrorKind::IncorrectArgumentType`] if the value isn't a `T`
    pub fn value<T: Clone + 'static>(&self, key: &str) -> Result<T, InstantiateErrorKind> {
        let incorrect = || InstantiateErrorKind::IncorrectArgumentType {
            key: key.to_owned(),
            expected: type_name::<T>(),
        };
        match self.required(key)? {
            ResolvedValue::Value(value) => value.downcast_ref::<T>().cloned().ok_or_else(incorrect),
            _ => Err(incorrect()),
        }
    }

    /// Implementation instance behind a dependency, for services without a typed view.
    ///
    /// # Errors
    /// - Returns [`InstantiateErrorKind::MissingArgument`] if nothing was resolved for `key`
    /// - Returns [`InstantiateErrorKind::IncorrectArgumentType`] if the instance isn't a `T`
    pub fn instance_of<T: Send + Sync + 'static>(&self, key: &str) -> Result<Arc<T>, InstantiateErrorKind> {
        self.instance(key)?
            .downcast::<T>()
            .map_err(|_| InstantiateErrorKind::IncorrectArgumentType {
                key: key.to_owned(),
                expected: type_name::<T>(),
            })
    }

    /// The raw value resolved for `key`.
    ///
    /// # Errors
    /// Returns [`InstantiateErrorKind::MissingArgument`] if nothing was resolved for `key`,
    /// or if `key` is a collection.
    pub fn instance(&self, key: &str) -> Result<Instance, InstantiateErrorKind> {
        match self.required(key)? {
            ResolvedValue::Service { instance, .. } | ResolvedValue::Value(instance) => Ok(instance.clone()),
            _ => Err(InstantiateErrorKind::MissingArgument { key: key.to_owned() }),
        }
    }

    /// Generic arguments the component was closed with. Empty for non-generic components.
    #[inline]
    #[must_use]
    pub fn generic_arguments(&self) -> &[ServiceType] {
        &self.generic_arguments
    }

    #[inline]
    #[must_use]
    pub fn generic_argument(&self, index: usize) -> Option<&ServiceType> {
        self.generic_arguments.get(index)
    }
}

#[cfg(test)]
mod tests {
    use super::{Arguments, ResolvedValue};
    use crate::{any::Instance, errors::InstantiateErrorKind};

    use std::sync::Arc;

    trait Greeter: Send + Sync {
        fn greet(&self) -> &'static str;
    }

    struct English;

    impl Greeter for English {
        fn greet(&self) -> &'static str {
            "hello"
        }
    }

    fn service(greeter: Arc<English>) -> ResolvedValue {
        let view: Arc<dyn Greeter> = greeter.clone();
        ResolvedValue::Service {
            instance: greeter,
            view: Arc::new(view),
        }
    }

    #[test]
    fn test_typed_access() {
        let mut arguments = Arguments::new("Component".into(), Arc::from(Vec::new()));
        arguments.push("greeter".into(), service(Arc::new(English)));
        arguments.push("retries".into(), ResolvedValue::Value(Arc::new(3u8) as Instance));
        arguments.push("missing".into(), ResolvedValue::Missing);
        arguments.push(
            "greeters".into(),
            ResolvedValue::Many(vec![Arc::new(Arc::new(English) as Arc<dyn Greeter>) as Instance]),
        );

        assert_eq!(arguments.get::<dyn Greeter>("greeter").unwrap().greet(), "hello");
        assert!(arguments.instance_of::<English>("greeter").is_ok());
        assert_eq!(arguments.value::<u8>("retries").unwrap(), 3);
        assert!(arguments.optional::<dyn Greeter>("missing").unwrap().is_none());
        assert_eq!(arguments.all::<dyn Greeter>("greeters").unwrap().len(), 1);
        assert!(arguments.all::<dyn Greeter>("unknown").unwrap().is_empty());
    }

    #[test]
    fn test_errors() {
        let mut arguments = Arguments::new("Component".into(), Arc::from(Vec::new()));
        arguments.push("retries".into(), ResolvedValue::Value(Arc::new(3u8) as Instance));

        assert!(matches!(
            arguments.get::<dyn Greeter>("greeter"),
            Err(InstantiateErrorKind::MissingArgument { .. })
        ));
        assert!(matches!(
            arguments.value::<u32>("retries"),
            Err(InstantiateErrorKind::IncorrectArgumentType { .. })
        ));
    }
}
