//! Runtime type model.
//!
//! Rust closes generics at compile time, so generic component families are
//! described with [`TypeDef`]s and [`ServiceType`] expressions instead. Plain Rust
//! types participate through [`ServiceType::of`], [`ServiceType::contract`] and
//! [`ServiceType::value`] and are compared by [`core::any::TypeId`].

use std::{
    borrow::Cow,
    fmt::{self, Display, Formatter},
    hash::{Hash, Hasher},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use crate::any::TypeInfo;

static NEXT_DEF_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Interface,
    Class,
    Struct,
    Pointer,
    ByRef,
    Void,
}

impl TypeKind {
    /// Kinds that can never be supplied as a generic argument.
    #[inline]
    #[must_use]
    pub fn is_valid_generic_argument(self) -> bool {
        !matches!(self, TypeKind::Pointer | TypeKind::ByRef | TypeKind::Void)
    }

    #[inline]
    #[must_use]
    pub fn is_reference_type(self) -> bool {
        matches!(self, TypeKind::Interface | TypeKind::Class)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Constraint {
    ReferenceType,
    ValueType,
    /// The argument must be, derive from or implement the given type.
    /// May refer to the definition's own parameters.
    Implements(ServiceType),
}

impl Constraint {
    #[must_use]
    pub fn is_satisfied_by(&self, argument: &ServiceType, arguments: &[ServiceType]) -> bool {
        match self {
            Constraint::ReferenceType => argument.kind().is_some_and(TypeKind::is_reference_type),
            Constraint::ValueType => argument.kind() == Some(TypeKind::Struct),
            Constraint::Implements(target) => argument.is_assignable_to(&target.substitute(arguments)),
        }
    }
}

impl Display for Constraint {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Constraint::ReferenceType => f.write_str("class"),
            Constraint::ValueType => f.write_str("struct"),
            Constraint::Implements(target) => Display::fmt(target, f),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GenericParam {
    pub name: Cow<'static, str>,
    pub constraints: Vec<Constraint>,
}

#[derive(Debug)]
pub struct TypeDef {
    id: u64,
    name: Cow<'static, str>,
    kind: TypeKind,
    params: Vec<GenericParam>,
    base: Option<ServiceType>,
    interfaces: Vec<ServiceType>,
}

impl TypeDef {
    #[inline]
    #[must_use]
    pub fn builder(name: impl Into<Cow<'static, str>>, kind: TypeKind) -> TypeDefBuilder {
        TypeDefBuilder {
            name: name.into(),
            kind,
            params: Vec::new(),
            base: None,
            interfaces: Vec::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn interface(name: impl Into<Cow<'static, str>>) -> TypeDefBuilder {
        Self::builder(name, TypeKind::Interface)
    }

    #[inline]
    #[must_use]
    pub fn class(name: impl Into<Cow<'static, str>>) -> TypeDefBuilder {
        Self::builder(name, TypeKind::Class)
    }

    #[inline]
    #[must_use]
    pub fn structure(name: impl Into<Cow<'static, str>>) -> TypeDefBuilder {
        Self::builder(name, TypeKind::Struct)
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    #[must_use]
    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    #[inline]
    #[must_use]
    pub fn params(&self) -> &[GenericParam] {
        &self.params
    }

    #[inline]
    #[must_use]
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    #[inline]
    #[must_use]
    pub fn base(&self) -> Option<&ServiceType> {
        self.base.as_ref()
    }

    #[inline]
    #[must_use]
    pub fn interfaces(&self) -> &[ServiceType] {
        &self.interfaces
    }
}

pub struct TypeDefBuilder {
    name: Cow<'static, str>,
    kind: TypeKind,
    params: Vec<GenericParam>,
    base: Option<ServiceType>,
    interfaces: Vec<ServiceType>,
}

impl TypeDefBuilder {
    #[inline]
    #[must_use]
    pub fn param(self, name: impl Into<Cow<'static, str>>) -> Self {
        self.param_with(name, [])
    }

    #[must_use]
    pub fn param_with(mut self, name: impl Into<Cow<'static, str>>, constraints: impl IntoIterator<Item = Constraint>) -> Self {
        self.params.push(GenericParam {
            name: name.into(),
            constraints: constraints.into_iter().collect(),
        });
        self
    }

    #[inline]
    #[must_use]
    pub fn base(mut self, base: ServiceType) -> Self {
        self.base = Some(base);
        self
    }

    #[inline]
    #[must_use]
    pub fn implements(mut self, interface: ServiceType) -> Self {
        self.interfaces.push(interface);
        self
    }

    #[must_use]
    pub fn build(self) -> Arc<TypeDef> {
        Arc::new(TypeDef {
            id: NEXT_DEF_ID.fetch_add(1, Ordering::Relaxed),
            name: self.name,
            kind: self.kind,
            params: self.params,
            base: self.base,
            interfaces: self.interfaces,
        })
    }
}

/// A type a component can expose, depend on, or be implemented by.
#[derive(Debug, Clone)]
pub struct ServiceType(Repr);

#[derive(Debug, Clone)]
enum Repr {
    Rust { info: TypeInfo, kind: TypeKind },
    Defined { def: Arc<TypeDef>, args: Arc<[ServiceType]> },
    Param(usize),
}

impl ServiceType {
    /// A concrete Rust type used as a class (implementation) service.
    #[inline]
    #[must_use]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self(Repr::Rust {
            info: TypeInfo::of::<T>(),
            kind: TypeKind::Class,
        })
    }

    /// A Rust trait object (or any type) used as a contract service.
    #[inline]
    #[must_use]
    pub fn contract<T: ?Sized + 'static>() -> Self {
        Self(Repr::Rust {
            info: TypeInfo::of::<T>(),
            kind: TypeKind::Interface,
        })
    }

    /// A Rust value type, typically used as a generic argument.
    #[inline]
    #[must_use]
    pub fn value<T: 'static>() -> Self {
        Self(Repr::Rust {
            info: TypeInfo::of::<T>(),
            kind: TypeKind::Struct,
        })
    }

    #[must_use]
    pub fn generic(def: &Arc<TypeDef>, args: impl IntoIterator<Item = ServiceType>) -> Self {
        Self(Repr::Defined {
            def: def.clone(),
            args: args.into_iter().collect(),
        })
    }

    /// The definition itself, every parameter left open: `Repository<T>`.
    #[must_use]
    pub fn open(def: &Arc<TypeDef>) -> Self {
        Self::generic(def, (0..def.arity()).map(ServiceType::param))
    }

    #[inline]
    #[must_use]
    pub fn param(index: usize) -> Self {
        Self(Repr::Param(index))
    }

    #[must_use]
    pub fn kind(&self) -> Option<TypeKind> {
        match &self.0 {
            Repr::Rust { kind, .. } => Some(*kind),
            Repr::Defined { def, .. } => Some(def.kind),
            Repr::Param(_) => None,
        }
    }

    #[must_use]
    pub fn type_info(&self) -> Option<TypeInfo> {
        match &self.0 {
            Repr::Rust { info, .. } => Some(*info),
            _ => None,
        }
    }

    #[must_use]
    pub fn definition(&self) -> Option<&Arc<TypeDef>> {
        match &self.0 {
            Repr::Defined { def, .. } => Some(def),
            _ => None,
        }
    }

    #[must_use]
    pub fn arguments(&self) -> &[ServiceType] {
        match &self.0 {
            Repr::Defined { args, .. } => args,
            _ => &[],
        }
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        match &self.0 {
            Repr::Rust { .. } => false,
            Repr::Defined { args, .. } => args.iter().any(ServiceType::is_open),
            Repr::Param(_) => true,
        }
    }

    /// One past the highest placeholder index used anywhere in this type.
    #[must_use]
    pub fn parameter_count(&self) -> usize {
        match &self.0 {
            Repr::Rust { .. } => 0,
            Repr::Defined { args, .. } => args.iter().map(ServiceType::parameter_count).max().unwrap_or(0),
            Repr::Param(index) => index + 1,
        }
    }

    #[must_use]
    pub fn is_generic(&self) -> bool {
        !self.arguments().is_empty()
    }

    #[must_use]
    pub fn same_definition(&self, other: &ServiceType) -> bool {
        match (self.definition(), other.definition()) {
            (Some(left), Some(right)) => left.id == right.id,
            _ => false,
        }
    }

    /// Replaces parameter placeholders with `args`; unknown indices stay open.
    #[must_use]
    pub fn substitute(&self, args: &[ServiceType]) -> ServiceType {
        match &self.0 {
            Repr::Rust { .. } => self.clone(),
            Repr::Defined { def, args: own } => Self(Repr::Defined {
                def: def.clone(),
                args: own.iter().map(|arg| arg.substitute(args)).collect(),
            }),
            Repr::Param(index) => args.get(*index).cloned().unwrap_or_else(|| self.clone()),
        }
    }

    /// Unifies this (possibly open) pattern with `concrete`, recording the
    /// argument bound to each placeholder. Returns `false` on any mismatch,
    /// including a placeholder bound to two different types.
    pub fn bind(&self, concrete: &ServiceType, bindings: &mut [Option<ServiceType>]) -> bool {
        match (&self.0, &concrete.0) {
            (Repr::Param(index), _) => match bindings.get_mut(*index) {
                Some(Some(bound)) => bound == concrete,
                Some(slot) => {
                    *slot = Some(concrete.clone());
                    true
                }
                None => false,
            },
            (Repr::Defined { def, args }, Repr::Defined { def: other, args: other_args }) => {
                def.id == other.id
                    && args.len() == other_args.len()
                    && args.iter().zip(other_args.iter()).all(|(pattern, arg)| pattern.bind(arg, bindings))
            }
            (Repr::Rust { info, .. }, Repr::Rust { info: other, .. }) => info == other,
            _ => false,
        }
    }

    #[must_use]
    pub fn base_type(&self) -> Option<ServiceType> {
        match &self.0 {
            Repr::Defined { def, args } => def.base.as_ref().map(|base| base.substitute(args)),
            _ => None,
        }
    }

    /// Base classes from the nearest to the most distant.
    #[must_use]
    pub fn base_chain(&self) -> Vec<ServiceType> {
        let mut chain = Vec::new();
        let mut current = self.base_type();
        while let Some(base) = current {
            current = base.base_type();
            chain.push(base);
        }
        chain
    }

    /// Every interface implemented directly, through other interfaces or through base classes.
    #[must_use]
    pub fn interfaces(&self) -> Vec<ServiceType> {
        let mut found: Vec<ServiceType> = Vec::new();
        let mut pending = Vec::new();
        if let Repr::Defined { def, args } = &self.0 {
            pending.extend(def.interfaces.iter().map(|interface| interface.substitute(args)));
        }
        for base in self.base_chain() {
            if let Repr::Defined { def, args } = &base.0 {
                pending.extend(def.interfaces.iter().map(|interface| interface.substitute(args)));
            }
        }
        while let Some(interface) = pending.pop() {
            if found.contains(&interface) {
                continue;
            }
            if let Repr::Defined { def, args } = &interface.0 {
                pending.extend(def.interfaces.iter().map(|inherited| inherited.substitute(args)));
            }
            found.push(interface);
        }
        found
    }

    #[must_use]
    pub fn is_assignable_to(&self, target: &ServiceType) -> bool {
        self == target || self.base_chain().contains(target) || self.interfaces().contains(target)
    }
}

impl PartialEq for ServiceType {
    fn eq(&self, other: &Self) -> bool {
        match (&self.0, &other.0) {
            (Repr::Rust { info, .. }, Repr::Rust { info: other, .. }) => info == other,
            (Repr::Defined { def, args }, Repr::Defined { def: other, args: other_args }) => def.id == other.id && args == other_args,
            (Repr::Param(index), Repr::Param(other)) => index == other,
            _ => false,
        }
    }
}

impl Eq for ServiceType {}

impl Hash for ServiceType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match &self.0 {
            Repr::Rust { info, .. } => {
                0u8.hash(state);
                info.hash(state);
            }
            Repr::Defined { def, args } => {
                1u8.hash(state);
                def.id.hash(state);
                args.hash(state);
            }
            Repr::Param(index) => {
                2u8.hash(state);
                index.hash(state);
            }
        }
    }
}

impl Display for ServiceType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Repr::Rust { info, .. } => f.write_str(info.short_name()),
            Repr::Defined { def, args } => {
                f.write_str(&def.name)?;
                if !args.is_empty() {
                    f.write_str("<")?;
                    for (index, arg) in args.iter().enumerate() {
                        if index > 0 {
                            f.write_str(", ")?;
                        }
                        Display::fmt(arg, f)?;
                    }
                    f.write_str(">")?;
                }
                Ok(())
            }
            Repr::Param(index) => write!(f, "T{index}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Constraint, ServiceType, TypeDef};

    use std::sync::Arc;

    struct Order;

    fn repository_family() -> (Arc<TypeDef>, Arc<TypeDef>, Arc<TypeDef>) {
        let repository = TypeDef::interface("IRepository").param("T").build();
        let base = TypeDef::class("RepositoryBase")
            .param("T")
            .implements(ServiceType::generic(&repository, [ServiceType::param(0)]))
            .build();
        let implementation = TypeDef::class("SqlRepository")
            .param("T")
            .base(ServiceType::generic(&base, [ServiceType::param(0)]))
            .build();
        (repository, base, implementation)
    }

    #[test]
    fn test_open_and_closed() {
        let (repository, ..) = repository_family();

        let open = ServiceType::open(&repository);
        let closed = ServiceType::generic(&repository, [ServiceType::of::<Order>()]);

        assert!(open.is_open());
        assert!(!closed.is_open());
        assert!(open.same_definition(&closed));
        assert_eq!(open.substitute(&[ServiceType::of::<Order>()]), closed);
        assert_eq!(closed.to_string(), "IRepository<Order>");
        assert_eq!(open.to_string(), "IRepository<T0>");
    }

    #[test]
    fn test_bind() {
        let pair = TypeDef::interface("IPair").param("A").param("B").build();
        let pattern = ServiceType::generic(&pair, [ServiceType::param(1), ServiceType::param(1)]);

        let mut bindings = vec![None, None];
        let same = ServiceType::generic(&pair, [ServiceType::value::<i32>(), ServiceType::value::<i32>()]);
        assert!(pattern.bind(&same, &mut bindings));
        assert_eq!(bindings, vec![None, Some(ServiceType::value::<i32>())]);

        let mut bindings = vec![None, None];
        let different = ServiceType::generic(&pair, [ServiceType::value::<i32>(), ServiceType::value::<u8>()]);
        assert!(!pattern.bind(&different, &mut bindings));
    }

    #[test]
    fn test_interfaces_through_base_chain() {
        let (repository, base, implementation) = repository_family();

        let closed = ServiceType::generic(&implementation, [ServiceType::of::<Order>()]);

        assert_eq!(
            closed.base_chain(),
            vec![ServiceType::generic(&base, [ServiceType::of::<Order>()])]
        );
        assert_eq!(
            closed.interfaces(),
            vec![ServiceType::generic(&repository, [ServiceType::of::<Order>()])]
        );
        assert!(closed.is_assignable_to(&ServiceType::generic(&repository, [ServiceType::of::<Order>()])));
    }

    #[test]
    fn test_constraints() {
        let entity = TypeDef::interface("IEntity").build();
        let customer = TypeDef::class("Customer").implements(ServiceType::generic(&entity, [])).build();
        let money = TypeDef::structure("Money").build();

        let entity_type = ServiceType::generic(&entity, []);
        let customer_type = ServiceType::generic(&customer, []);
        let money_type = ServiceType::generic(&money, []);

        assert!(Constraint::Implements(entity_type.clone()).is_satisfied_by(&customer_type, &[]));
        assert!(!Constraint::Implements(entity_type).is_satisfied_by(&money_type, &[]));
        assert!(Constraint::ReferenceType.is_satisfied_by(&customer_type, &[]));
        assert!(Constraint::ValueType.is_satisfied_by(&money_type, &[]));
        assert!(Constraint::ValueType.is_satisfied_by(&ServiceType::value::<i32>(), &[]));
    }

    #[test]
    fn test_rust_types_compare_by_type_id() {
        assert_eq!(ServiceType::of::<Order>(), ServiceType::contract::<Order>());
        assert_ne!(ServiceType::of::<Order>(), ServiceType::of::<i32>());
    }
}
