use std::sync::Arc;

use tracing::debug;

use crate::{
    any::Instance,
    arguments::Arguments,
    dependency_resolver::DependencyResolver,
    errors::InstantiateErrorKind,
};

/// Builds an implementation from typed dependencies.
pub trait Instantiator<Deps>: Clone + Send + Sync + 'static
where
    Deps: DependencyResolver,
{
    type Provides: Send + Sync + 'static;
    type Error: Into<InstantiateErrorKind>;

    /// # Errors
    /// Any error aborts creation of the instance.
    fn instantiate(&self, dependencies: Deps) -> Result<Self::Provides, Self::Error>;
}

/// Type-erased constructor of a component's instances.
pub(crate) type Activator = Arc<dyn Fn(&Arguments) -> Result<Instance, InstantiateErrorKind> + Send + Sync>;

#[must_use]
pub(crate) fn boxed_instantiator_factory<Inst, Deps>(instantiator: Inst) -> Activator
where
    Inst: Instantiator<Deps>,
    Deps: DependencyResolver,
{
    Arc::new(move |arguments: &Arguments| {
        let dependencies = Deps::resolve(arguments)?;
        let provided = instantiator.instantiate(dependencies).map_err(Into::<InstantiateErrorKind>::into)?;

        debug!("Instantiated");

        Ok(Arc::new(provided) as Instance)
    })
}

macro_rules! impl_instantiator {
    (
        [$($ty:ident),*]
    ) => {
        #[allow(non_snake_case)]
        impl<F, Response, Err, $($ty,)*> Instantiator<($($ty,)*)> for F
        where
            F: Fn($($ty,)*) -> Result<Response, Err> + Clone + Send + Sync + 'static,
            Response: Send + Sync + 'static,
            Err: Into<InstantiateErrorKind>,
            $( $ty: DependencyResolver, )*
        {
            type Provides = Response;
            type Error = Err;

            fn instantiate(&self, ($($ty,)*): ($($ty,)*)) -> Result<Self::Provides, Self::Error> {
                self($($ty,)*)
            }
        }
    };
}

all_the_tuples!(impl_instantiator);
