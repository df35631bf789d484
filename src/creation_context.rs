use std::{collections::HashMap, sync::Arc};

use crate::{
    any::Instance,
    burden::Burden,
    container::ContainerInner,
    context::Context,
    handler::{Handler, HandlerId},
    lifestyle::{Binder, BindingTarget, Selection},
    release_policy::ReleasePolicy,
    scope::ScopeFrame,
};

/// A component being created, with the burdens it will own.
struct CreationFrame {
    handler: Arc<Handler>,
    children: Vec<Burden>,
    bound: HashMap<HandlerId, Burden>,
}

/// Mutable state of one top-level resolve call.
///
/// Holds the handlers in flight for cycle detection, the components being
/// created with the burdens they will own, and the scope and inline arguments
/// the call runs with.
pub struct CreationContext<'a> {
    container: &'a ContainerInner,
    scope: Option<Arc<ScopeFrame>>,
    arguments: Option<&'a Context>,
    in_flight: Vec<(HandlerId, String)>,
    frames: Vec<CreationFrame>,
    in_progress: HashMap<HandlerId, Instance>,
}

impl<'a> CreationContext<'a> {
    pub(crate) fn new(container: &'a ContainerInner, scope: Option<Arc<ScopeFrame>>, arguments: Option<&'a Context>) -> Self {
        Self {
            container,
            scope,
            arguments,
            in_flight: Vec::new(),
            frames: Vec::new(),
            in_progress: HashMap::new(),
        }
    }

    #[inline]
    pub(crate) fn container(&self) -> &'a ContainerInner {
        self.container
    }

    #[inline]
    #[must_use]
    pub fn policy(&self) -> &Arc<dyn ReleasePolicy> {
        &self.container.policy
    }

    /// Innermost scope the call runs in, if any.
    #[inline]
    #[must_use]
    pub fn scope(&self) -> Option<&Arc<ScopeFrame>> {
        self.scope.as_ref()
    }

    /// Whether the instance being resolved is the one the caller asked for,
    /// rather than a dependency of another component.
    #[inline]
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.frames.is_empty()
    }

    /// Hands `burden` to the component being created, which releases it together with itself.
    pub fn attach(&mut self, burden: Burden) {
        if let Some(frame) = self.frames.last_mut() {
            frame.children.push(burden);
        }
    }

    pub fn track(&self, burden: &Burden) {
        self.container.policy.track(burden);
    }

    /// Roots needing a release are tracked; dependencies belong to their parent.
    pub fn attach_or_track(&mut self, burden: &Burden) {
        if self.is_root() {
            if burden.requires_policy_release() {
                self.track(burden);
            }
        } else {
            self.attach(burden.clone());
        }
    }

    /// Inline arguments visible to the handler about to resolve the root.
    pub(crate) fn root_arguments(&self) -> Option<&'a Context> {
        self.arguments.filter(|_| self.frames.is_empty())
    }

    /// Inline arguments visible to the dependencies of the component being created.
    pub(crate) fn creation_arguments(&self) -> Option<&'a Context> {
        self.arguments.filter(|_| self.frames.len() == 1)
    }

    pub(crate) fn is_in_flight(&self, handler: HandlerId) -> bool {
        self.in_flight.iter().any(|(id, _)| *id == handler)
    }

    pub(crate) fn enter(&mut self, handler: HandlerId, name: &str) {
        self.in_flight.push((handler, name.to_owned()));
    }

    pub(crate) fn exit(&mut self, handler: HandlerId) {
        if let Some(position) = self.in_flight.iter().rposition(|(id, _)| *id == handler) {
            self.in_flight.remove(position);
        }
        self.in_progress.remove(&handler);
    }

    /// Components in flight from the root down, closed by `name`.
    pub(crate) fn chain(&self, name: &str) -> Vec<String> {
        self.in_flight
            .iter()
            .map(|(_, in_flight)| in_flight.clone())
            .chain(core::iter::once(name.to_owned()))
            .collect()
    }

    pub(crate) fn push_frame(&mut self, handler: Arc<Handler>) {
        self.frames.push(CreationFrame {
            handler,
            children: Vec::new(),
            bound: HashMap::new(),
        });
    }

    pub(crate) fn pop_frame(&mut self) -> Vec<Burden> {
        self.frames.pop().map(|frame| frame.children).unwrap_or_default()
    }

    pub(crate) fn set_in_progress(&mut self, handler: HandlerId, instance: Instance) {
        self.in_progress.insert(handler, instance);
    }

    pub(crate) fn in_progress(&self, handler: HandlerId) -> Option<Instance> {
        self.in_progress.get(&handler).cloned()
    }

    /// Index of the frame a bound component attaches to.
    pub(crate) fn anchor(&self, binder: &Binder) -> Option<usize> {
        let matches = |frame: &&CreationFrame| {
            let model = frame.handler.model();
            match &binder.target {
                BindingTarget::Service(service) => model.services().contains(service),
                BindingTarget::Component(name) => model.name() == &**name,
            }
        };
        let mut frames = self.frames.iter().enumerate();
        match binder.selection {
            Selection::Nearest => frames.rev().find(|(_, frame)| matches(frame)).map(|(index, _)| index),
            Selection::Outermost => frames.find(|(_, frame)| matches(frame)).map(|(index, _)| index),
        }
    }

    pub(crate) fn bound(&self, anchor: usize, handler: HandlerId) -> Option<Burden> {
        self.frames.get(anchor).and_then(|frame| frame.bound.get(&handler).cloned())
    }

    pub(crate) fn bind(&mut self, anchor: usize, handler: HandlerId, burden: Burden) {
        if let Some(frame) = self.frames.get_mut(anchor) {
            frame.bound.insert(handler, burden.clone());
            frame.children.push(burden);
        }
    }
}
