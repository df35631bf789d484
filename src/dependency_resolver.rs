use crate::{arguments::Arguments, dependency::DependencyModel, errors::InstantiateErrorKind};

/// Typed extraction of one or more dependencies from [`Arguments`].
///
/// Implementors also describe the dependencies they extract, so a factory
/// built from them declares its dependencies without repeating itself.
pub trait DependencyResolver: Sized {
    /// # Errors
    /// Returns [`InstantiateErrorKind`] if a declared dependency can't be extracted.
    fn resolve(arguments: &Arguments) -> Result<Self, InstantiateErrorKind>;

    fn dependencies() -> Vec<DependencyModel>;
}

macro_rules! impl_dependency_resolver {
    (
        [$($ty:ident),*]
    ) => {
        #[allow(non_snake_case, unused_mut)]
        impl<$($ty,)*> DependencyResolver for ($($ty,)*)
        where
            $( $ty: DependencyResolver, )*
        {
            #[inline]
            #[allow(unused_variables)]
            fn resolve(arguments: &Arguments) -> Result<Self, InstantiateErrorKind> {
                Ok(($($ty::resolve(arguments)?,)*))
            }

            fn dependencies() -> Vec<DependencyModel> {
                let mut dependencies = Vec::new();
                $( dependencies.extend($ty::dependencies()); )*
                dependencies
            }
        }
    };
}

all_the_tuples!(impl_dependency_resolver);

#[cfg(test)]
mod tests {
    use super::DependencyResolver;
    use crate::{
        dependency::DependencyKind,
        inject::{Inject, InjectAll, InjectOptional, InjectParam},
    };

    trait Clock: Send + Sync {}
    trait Sink: Send + Sync {}

    #[test]
    fn test_tuple_dependencies() {
        let dependencies = <(Inject<dyn Clock>, InjectOptional<dyn Sink>, InjectAll<dyn Sink>, InjectParam<u16>)>::dependencies();

        let kinds: Vec<_> = dependencies.iter().map(|dependency| (dependency.kind(), dependency.is_optional())).collect();
        assert_eq!(
            kinds,
            vec![
                (DependencyKind::Service, false),
                (DependencyKind::Service, true),
                (DependencyKind::Collection, false),
                (DependencyKind::Parameter, false),
            ]
        );
        assert!(<()>::dependencies().is_empty());
    }
}
