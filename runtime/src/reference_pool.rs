//! A pool of names that are referenced before it is known what (if
//! anything) declares them.
//!
//! Referrers register interest in a name together with a primary callback
//! and optionally a secondary callback. Once the names are bound, the
//! pool runs every primary callback and only then every secondary
//! callback. A secondary callback can therefore rely on every direct
//! binding in the pool being complete.
//!
//! ```ignore
//! TYPE
//!    Level : Percent;    (* Percent is declared later *)
//!    Percent : INT;
//! END_TYPE
//! ```
use std::collections::HashMap;

use log::trace;
use stint_dsl::{
    core::{Id, SourceSpan},
    diagnostic::{Diagnostic, Label},
};
use stint_problems::Problem;

/// Additional information about how a name was bound.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Remark {
    /// The name is a program rather than a variable.
    Program,
    /// The name is a global variable rather than a local variable.
    Global,
}

/// What a callback is told about the name that it referred to.
pub struct Resolution<'a, T> {
    pub name: &'a Id,
    pub target: &'a T,
    pub remark: Option<Remark>,
    /// Where the referrer refers to the name.
    pub span: &'a SourceSpan,
}

/// Callback invoked with the context, the referrer and the resolution.
pub type Callback<T, R, C> = fn(&mut C, &R, &Resolution<'_, T>) -> Result<(), Diagnostic>;

#[derive(Clone, Debug)]
enum Binding<T> {
    Waiting,
    Resolved(T),
    Undefined,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Progress {
    Pending,
    Succeeded,
    Failed,
}

struct Referrer<T, R, C> {
    referrer: R,
    span: SourceSpan,
    primary: Callback<T, R, C>,
    secondary: Option<Callback<T, R, C>>,
    primary_progress: Progress,
    secondary_progress: Progress,
}

struct Entry<T, R, C> {
    name: Id,
    binding: Binding<T>,
    remark: Option<Remark>,
    referrers: Vec<Referrer<T, R, C>>,
}

/// The pool is generic over the target `T` that names resolve to, the
/// referrer `R` handed back to callbacks and the context `C` that
/// callbacks mutate.
pub struct NamedReferencePool<T, R, C> {
    entries: Vec<Entry<T, R, C>>,
    index: HashMap<Id, usize>,
    /// The problem reported for each referrer of a name that is never
    /// resolved.
    undefined: Problem,
}

impl<T, R, C> NamedReferencePool<T, R, C> {
    pub fn new(undefined: Problem) -> Self {
        Self {
            entries: vec![],
            index: HashMap::new(),
            undefined,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn entry_mut(&mut self, name: &Id) -> &mut Entry<T, R, C> {
        let position = match self.index.get(name) {
            Some(position) => *position,
            None => {
                self.entries.push(Entry {
                    name: name.clone(),
                    binding: Binding::Waiting,
                    remark: None,
                    referrers: vec![],
                });
                self.index.insert(name.clone(), self.entries.len() - 1);
                self.entries.len() - 1
            }
        };
        &mut self.entries[position]
    }

    /// Registers interest in the name with a single callback.
    pub fn add(&mut self, name: &Id, referrer: R, span: SourceSpan, primary: Callback<T, R, C>) {
        self.push(name, referrer, span, primary, None)
    }

    /// Registers interest in the name with a primary callback and a
    /// secondary callback that runs after every primary callback in the
    /// pool.
    pub fn add_two_step(
        &mut self,
        name: &Id,
        referrer: R,
        span: SourceSpan,
        primary: Callback<T, R, C>,
        secondary: Callback<T, R, C>,
    ) {
        self.push(name, referrer, span, primary, Some(secondary))
    }

    fn push(
        &mut self,
        name: &Id,
        referrer: R,
        span: SourceSpan,
        primary: Callback<T, R, C>,
        secondary: Option<Callback<T, R, C>>,
    ) {
        self.entry_mut(name).referrers.push(Referrer {
            referrer,
            span,
            primary,
            secondary,
            primary_progress: Progress::Pending,
            secondary_progress: Progress::Pending,
        });
    }

    /// Binds the name to the target.
    pub fn resolve(&mut self, name: &Id, target: T) {
        let entry = self.entry_mut(name);
        entry.binding = Binding::Resolved(target);
        entry.remark = None;
    }

    /// Binds the name to the target with a remark about the binding.
    pub fn resolve_with_remark(&mut self, name: &Id, target: T, remark: Remark) {
        let entry = self.entry_mut(name);
        entry.binding = Binding::Resolved(target);
        entry.remark = Some(remark);
    }

    /// Records that nothing declares the name. This prevents the name from
    /// being returned by [`Self::next_unresolved`] again.
    pub fn mark_undefined(&mut self, name: &Id) {
        self.entry_mut(name).binding = Binding::Undefined;
    }

    /// Returns a name that is neither resolved nor known to be undefined.
    pub fn next_unresolved(&self) -> Option<&Id> {
        self.entries
            .iter()
            .find(|entry| matches!(entry.binding, Binding::Waiting))
            .map(|entry| &entry.name)
    }

    /// Returns the target that the name is bound to.
    pub fn target(&self, name: &Id) -> Option<&T> {
        self.index
            .get(name)
            .and_then(|position| match &self.entries[*position].binding {
                Binding::Resolved(target) => Some(target),
                _ => None,
            })
    }

    /// Runs the primary callback of every referrer and then the secondary
    /// callback of every referrer whose primary callback succeeded. Each
    /// callback runs at most once until [`Self::reset_resolved`].
    ///
    /// Names that are still waiting are undefined. Every failure is
    /// collected; a failure does not stop other callbacks.
    pub fn trigger_resolve_callbacks(&mut self, context: &mut C) -> Result<(), Vec<Diagnostic>> {
        let mut errors = vec![];
        let undefined = self.undefined;

        for entry in self.entries.iter_mut() {
            if matches!(entry.binding, Binding::Waiting) {
                entry.binding = Binding::Undefined;
            }
            if !matches!(entry.binding, Binding::Undefined) {
                continue;
            }
            for referrer in entry
                .referrers
                .iter_mut()
                .filter(|referrer| referrer.primary_progress == Progress::Pending)
            {
                referrer.primary_progress = Progress::Failed;
                errors.push(
                    Diagnostic::problem(undefined, Label::span(referrer.span.clone(), "Reference"))
                        .with_context_id("name", &entry.name),
                );
            }
        }

        let mut primaries = 0;
        for entry in self.entries.iter_mut() {
            let Entry {
                name,
                binding,
                remark,
                referrers,
            } = entry;
            let Binding::Resolved(target) = &*binding else {
                continue;
            };
            for referrer in referrers
                .iter_mut()
                .filter(|referrer| referrer.primary_progress == Progress::Pending)
            {
                let resolution = Resolution {
                    name: &*name,
                    target,
                    remark: *remark,
                    span: &referrer.span,
                };
                let result = (referrer.primary)(context, &referrer.referrer, &resolution);
                primaries += 1;
                referrer.primary_progress = match result {
                    Ok(()) => Progress::Succeeded,
                    Err(err) => {
                        errors.push(err);
                        Progress::Failed
                    }
                };
            }
        }
        trace!("Completed {} primary callbacks", primaries);

        for entry in self.entries.iter_mut() {
            let Entry {
                name,
                binding,
                remark,
                referrers,
            } = entry;
            let Binding::Resolved(target) = &*binding else {
                continue;
            };
            for referrer in referrers.iter_mut().filter(|referrer| {
                referrer.primary_progress == Progress::Succeeded
                    && referrer.secondary_progress == Progress::Pending
            }) {
                let Some(secondary) = referrer.secondary else {
                    referrer.secondary_progress = Progress::Succeeded;
                    continue;
                };
                let resolution = Resolution {
                    name: &*name,
                    target,
                    remark: *remark,
                    span: &referrer.span,
                };
                let result = secondary(context, &referrer.referrer, &resolution);
                referrer.secondary_progress = match result {
                    Ok(()) => Progress::Succeeded,
                    Err(err) => {
                        errors.push(err);
                        Progress::Failed
                    }
                };
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Clears every binding so that resolution can run again.
    pub fn reset_resolved(&mut self) {
        for entry in self.entries.iter_mut() {
            entry.binding = Binding::Waiting;
            entry.remark = None;
            for referrer in entry.referrers.iter_mut() {
                referrer.primary_progress = Progress::Pending;
                referrer.secondary_progress = Progress::Pending;
            }
        }
    }

    /// Folds the other pool into this pool. For a name in both pools,
    /// this pool's entry is kept and the other pool's referrers are
    /// appended to it.
    pub fn merge(&mut self, other: Self) {
        for other_entry in other.entries {
            match self.index.get(&other_entry.name) {
                Some(position) => {
                    let entry = &mut self.entries[*position];
                    if matches!(entry.binding, Binding::Waiting) {
                        entry.binding = other_entry.binding;
                        entry.remark = other_entry.remark;
                    }
                    entry.referrers.extend(other_entry.referrers);
                }
                None => {
                    self.index
                        .insert(other_entry.name.clone(), self.entries.len());
                    self.entries.push(other_entry);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestPool = NamedReferencePool<u32, u32, Vec<String>>;

    fn record_primary(
        log: &mut Vec<String>,
        referrer: &u32,
        resolution: &Resolution<'_, u32>,
    ) -> Result<(), Diagnostic> {
        log.push(format!("primary {} -> {}", referrer, resolution.target));
        Ok(())
    }

    fn record_secondary(
        log: &mut Vec<String>,
        referrer: &u32,
        resolution: &Resolution<'_, u32>,
    ) -> Result<(), Diagnostic> {
        log.push(format!("secondary {} -> {}", referrer, resolution.target));
        Ok(())
    }

    fn fail_primary(
        _log: &mut Vec<String>,
        _referrer: &u32,
        resolution: &Resolution<'_, u32>,
    ) -> Result<(), Diagnostic> {
        Err(Diagnostic::problem(
            Problem::NotImplemented,
            Label::span(resolution.span.clone(), "Failed"),
        ))
    }

    fn record_remark(
        log: &mut Vec<String>,
        _referrer: &u32,
        resolution: &Resolution<'_, u32>,
    ) -> Result<(), Diagnostic> {
        log.push(format!("{:?}", resolution.remark));
        Ok(())
    }

    #[test]
    fn trigger_resolve_callbacks_when_two_step_then_secondary_after_every_primary() {
        let mut pool = TestPool::new(Problem::UndefinedReference);
        pool.add_two_step(
            &Id::from("Level"),
            1,
            SourceSpan::default(),
            record_primary,
            record_secondary,
        );
        pool.add(&Id::from("Percent"), 2, SourceSpan::default(), record_primary);
        pool.add(&Id::from("Speed"), 3, SourceSpan::default(), record_primary);

        pool.resolve(&Id::from("Level"), 10);
        pool.resolve(&Id::from("Percent"), 20);
        pool.resolve(&Id::from("Speed"), 30);
        assert!(pool.next_unresolved().is_none());

        let mut log = vec![];
        pool.trigger_resolve_callbacks(&mut log).unwrap();

        assert_eq!(
            vec![
                "primary 1 -> 10",
                "primary 2 -> 20",
                "primary 3 -> 30",
                "secondary 1 -> 10"
            ],
            log
        );
    }

    #[test]
    fn next_unresolved_when_resolved_in_any_order_then_none() {
        let mut pool = TestPool::new(Problem::UndefinedReference);
        pool.add(&Id::from("A"), 1, SourceSpan::default(), record_primary);
        pool.add(&Id::from("B"), 2, SourceSpan::default(), record_primary);

        assert_eq!(Some(&Id::from("A")), pool.next_unresolved());
        pool.resolve(&Id::from("b"), 20);
        assert_eq!(Some(&Id::from("A")), pool.next_unresolved());
        pool.resolve(&Id::from("a"), 10);
        assert_eq!(None, pool.next_unresolved());
        assert_eq!(Some(&20), pool.target(&Id::from("B")));
    }

    #[test]
    fn trigger_resolve_callbacks_when_undefined_then_error_per_referrer() {
        let mut pool = TestPool::new(Problem::UndefinedReference);
        pool.add(&Id::from("Missing"), 1, SourceSpan::range(2, 9), record_primary);
        pool.add(&Id::from("Missing"), 2, SourceSpan::range(12, 19), record_primary);
        pool.mark_undefined(&Id::from("Missing"));

        let mut log = vec![];
        let errors = pool.trigger_resolve_callbacks(&mut log).unwrap_err();

        assert!(log.is_empty());
        assert_eq!(2, errors.len());
        assert_eq!(Problem::UndefinedReference.code(), errors[0].code);
        assert_eq!(12, errors[1].primary.span.start);
    }

    #[test]
    fn trigger_resolve_callbacks_when_waiting_then_undefined() {
        let mut pool = TestPool::new(Problem::VariableUndefined);
        pool.add(&Id::from("Missing"), 1, SourceSpan::default(), record_primary);

        let mut log = vec![];
        let errors = pool.trigger_resolve_callbacks(&mut log).unwrap_err();

        assert_eq!(Problem::VariableUndefined.code(), errors[0].code);
        assert!(pool.next_unresolved().is_none());
    }

    #[test]
    fn trigger_resolve_callbacks_when_primary_fails_then_secondary_skipped() {
        let mut pool = TestPool::new(Problem::UndefinedReference);
        pool.add_two_step(
            &Id::from("Level"),
            1,
            SourceSpan::default(),
            fail_primary,
            record_secondary,
        );
        pool.add(&Id::from("Speed"), 2, SourceSpan::default(), record_primary);
        pool.resolve(&Id::from("Level"), 10);
        pool.resolve(&Id::from("Speed"), 30);

        let mut log = vec![];
        let errors = pool.trigger_resolve_callbacks(&mut log).unwrap_err();

        assert_eq!(1, errors.len());
        assert_eq!(vec!["primary 2 -> 30"], log);
    }

    #[test]
    fn trigger_resolve_callbacks_when_called_twice_then_callbacks_run_once() {
        let mut pool = TestPool::new(Problem::UndefinedReference);
        pool.add_two_step(
            &Id::from("Level"),
            1,
            SourceSpan::default(),
            record_primary,
            record_secondary,
        );
        pool.resolve(&Id::from("Level"), 10);

        let mut log = vec![];
        pool.trigger_resolve_callbacks(&mut log).unwrap();
        pool.trigger_resolve_callbacks(&mut log).unwrap();

        assert_eq!(2, log.len());
    }

    #[test]
    fn reset_resolved_when_resolved_again_then_same_callbacks() {
        let mut pool = TestPool::new(Problem::UndefinedReference);
        pool.add_two_step(
            &Id::from("Level"),
            1,
            SourceSpan::default(),
            record_primary,
            record_secondary,
        );
        pool.resolve(&Id::from("Level"), 10);
        let mut first = vec![];
        pool.trigger_resolve_callbacks(&mut first).unwrap();

        pool.reset_resolved();
        assert_eq!(Some(&Id::from("Level")), pool.next_unresolved());
        pool.resolve(&Id::from("Level"), 10);
        let mut second = vec![];
        pool.trigger_resolve_callbacks(&mut second).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn merge_when_same_name_then_keeps_first_binding_and_appends_referrers() {
        let mut first = TestPool::new(Problem::UndefinedReference);
        first.add(&Id::from("Level"), 1, SourceSpan::default(), record_primary);
        first.resolve(&Id::from("Level"), 10);

        let mut second = TestPool::new(Problem::UndefinedReference);
        second.add(&Id::from("LEVEL"), 2, SourceSpan::default(), record_primary);
        second.add(&Id::from("Speed"), 3, SourceSpan::default(), record_primary);
        second.resolve(&Id::from("Level"), 20);

        first.merge(second);
        first.resolve(&Id::from("Speed"), 30);

        let mut log = vec![];
        first.trigger_resolve_callbacks(&mut log).unwrap();

        assert_eq!(2, first.len());
        assert_eq!(
            vec!["primary 1 -> 10", "primary 2 -> 10", "primary 3 -> 30"],
            log
        );
    }

    #[test]
    fn resolve_with_remark_when_triggered_then_callback_receives_remark() {
        let mut pool = TestPool::new(Problem::UndefinedReference);
        pool.add(&Id::from("Main"), 1, SourceSpan::default(), record_remark);
        pool.resolve_with_remark(&Id::from("Main"), 10, Remark::Program);

        let mut log = vec![];
        pool.trigger_resolve_callbacks(&mut log).unwrap();

        assert_eq!(vec!["Some(Program)"], log);
    }
}
