use std::{any::type_name, sync::Arc};

use crate::{arguments::Arguments, dependency::DependencyModel, dependency_resolver::DependencyResolver, errors::InstantiateErrorKind};

/// Required service dependency.
pub struct Inject<S: ?Sized>(pub Arc<S>);

impl<S: ?Sized + Send + Sync + 'static> DependencyResolver for Inject<S> {
    fn resolve(arguments: &Arguments) -> Result<Self, InstantiateErrorKind> {
        arguments.get(type_name::<S>()).map(Self)
    }

    fn dependencies() -> Vec<DependencyModel> {
        vec![DependencyModel::service::<S>()]
    }
}

/// Service dependency that is `None` when no component can supply it.
pub struct InjectOptional<S: ?Sized>(pub Option<Arc<S>>);

impl<S: ?Sized + Send + Sync + 'static> DependencyResolver for InjectOptional<S> {
    fn resolve(arguments: &Arguments) -> Result<Self, InstantiateErrorKind> {
        arguments.optional(type_name::<S>()).map(Self)
    }

    fn dependencies() -> Vec<DependencyModel> {
        vec![DependencyModel::service::<S>().optional()]
    }
}

/// Every component supporting `S`, in registration order.
pub struct InjectAll<S: ?Sized>(pub Vec<Arc<S>>);

impl<S: ?Sized + Send + Sync + 'static> DependencyResolver for InjectAll<S> {
    fn resolve(arguments: &Arguments) -> Result<Self, InstantiateErrorKind> {
        arguments.all(type_name::<Vec<Arc<S>>>()).map(Self)
    }

    fn dependencies() -> Vec<DependencyModel> {
        vec![DependencyModel::collection::<S>().keyed(type_name::<Vec<Arc<S>>>())]
    }
}

/// Plain value supplied inline, by an override or by conversion.
pub struct InjectParam<T>(pub T);

impl<T: Clone + 'static> DependencyResolver for InjectParam<T> {
    fn resolve(arguments: &Arguments) -> Result<Self, InstantiateErrorKind> {
        arguments.value(type_name::<T>()).map(Self)
    }

    fn dependencies() -> Vec<DependencyModel> {
        vec![DependencyModel::parameter::<T>()]
    }
}
