/// A reversible mutation: applying it yields the command that undoes it.
pub trait Command: Sized + Clone {
    type Target;
    type Error;

    fn apply(self, target: &mut Self::Target) -> Result<Self, Self::Error>;

    /// Command that restores the target's current selection state when
    /// applied. Captured around every group so undo and redo bring the
    /// selection back with the content.
    fn capture(_target: &Self::Target) -> Option<Self> {
        None
    }
}

/// One user-visible undo step.
///
/// On the undo stack `commands` are inverses in the order they were produced
/// (undo applies them back to front); on the redo stack they are the forward
/// commands in application order.
#[derive(Debug, Clone)]
pub struct HistoryEntry<C> {
    pub label: String,
    commands: Vec<C>,
    before: Option<C>,
    after: Option<C>,
}

impl<C> HistoryEntry<C> {
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// Collects the inverses of every command applied inside a group.
pub struct Transaction<'a, C: Command> {
    target: &'a mut C::Target,
    inverses: Vec<C>,
}

impl<'a, C: Command> Transaction<'a, C> {
    pub fn apply(&mut self, command: C) -> Result<(), C::Error> {
        let inverse = command.apply(self.target)?;
        self.inverses.push(inverse);
        Ok(())
    }

    pub fn target(&self) -> &C::Target {
        self.target
    }

    /// Direct access for selection changes; these are not recorded one by
    /// one, the group's selection capture covers them.
    pub fn target_mut(&mut self) -> &mut C::Target {
        self.target
    }

    pub fn applied(&self) -> usize {
        self.inverses.len()
    }
}

/// Apply commands in order. On failure everything applied so far is reverted
/// and the error returned.
fn apply_all<C: Command>(target: &mut C::Target, commands: Vec<C>) -> Result<Vec<C>, C::Error> {
    let mut inverses = Vec::with_capacity(commands.len());
    for command in commands {
        match command.apply(target) {
            Ok(inverse) => inverses.push(inverse),
            Err(err) => {
                revert(target, inverses);
                return Err(err);
            }
        }
    }
    Ok(inverses)
}

fn revert<C: Command>(target: &mut C::Target, inverses: Vec<C>) {
    for inverse in inverses.into_iter().rev() {
        let _ = inverse.apply(target);
    }
}

#[derive(Debug, Clone)]
pub struct CommandHistory<C> {
    undo_stack: Vec<HistoryEntry<C>>,
    redo_stack: Vec<HistoryEntry<C>>,
    limit: Option<usize>,
}

impl<C> Default for CommandHistory<C> {
    fn default() -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            limit: None,
        }
    }
}

impl<C: Command> CommandHistory<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `limit` undo steps; the oldest are dropped first
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..Self::default()
        }
    }

    pub fn set_limit(&mut self, limit: Option<usize>) {
        self.limit = limit;
        self.enforce_limit();
    }

    /// Run `body` as a single undo step.
    ///
    /// When `body` fails every command it applied is reverted, the selection
    /// captured on entry is restored and nothing is recorded. Groups that
    /// applied no command leave the stacks untouched.
    pub fn transact<R, F>(
        &mut self,
        target: &mut C::Target,
        label: impl Into<String>,
        body: F,
    ) -> Result<R, C::Error>
    where
        F: FnOnce(&mut Transaction<'_, C>) -> Result<R, C::Error>,
    {
        let before = C::capture(target);
        let mut tx = Transaction {
            target,
            inverses: Vec::new(),
        };
        let result = body(&mut tx);
        let Transaction { target, inverses } = tx;
        match result {
            Ok(value) => {
                if !inverses.is_empty() {
                    let after = C::capture(target);
                    self.undo_stack.push(HistoryEntry {
                        label: label.into(),
                        commands: inverses,
                        before,
                        after,
                    });
                    self.redo_stack.clear();
                    self.enforce_limit();
                }
                Ok(value)
            }
            Err(err) => {
                revert(target, inverses);
                if let Some(before) = before {
                    let _ = before.apply(target);
                }
                Err(err)
            }
        }
    }

    /// Record a single command as its own undo step
    pub fn apply(
        &mut self,
        target: &mut C::Target,
        label: impl Into<String>,
        command: C,
    ) -> Result<(), C::Error> {
        self.transact(target, label, |tx| tx.apply(command))
    }

    /// Undo the latest group. Returns its label, or `None` when there is
    /// nothing to undo.
    pub fn undo(&mut self, target: &mut C::Target) -> Result<Option<String>, C::Error> {
        let Some(entry) = self.undo_stack.pop() else {
            return Ok(None);
        };
        let backwards: Vec<C> = entry.commands.iter().rev().cloned().collect();
        let mut forwards = match apply_all(target, backwards) {
            Ok(forwards) => forwards,
            Err(err) => {
                self.undo_stack.push(entry);
                return Err(err);
            }
        };
        forwards.reverse();
        if let Some(before) = entry.before.clone() {
            before.apply(target)?;
        }
        let label = entry.label.clone();
        self.redo_stack.push(HistoryEntry {
            label: entry.label,
            commands: forwards,
            before: entry.before,
            after: entry.after,
        });
        Ok(Some(label))
    }

    pub fn redo(&mut self, target: &mut C::Target) -> Result<Option<String>, C::Error> {
        let Some(entry) = self.redo_stack.pop() else {
            return Ok(None);
        };
        let inverses = match apply_all(target, entry.commands.clone()) {
            Ok(inverses) => inverses,
            Err(err) => {
                self.redo_stack.push(entry);
                return Err(err);
            }
        };
        if let Some(after) = entry.after.clone() {
            after.apply(target)?;
        }
        let label = entry.label.clone();
        self.undo_stack.push(HistoryEntry {
            label: entry.label,
            commands: inverses,
            before: entry.before,
            after: entry.after,
        });
        Ok(Some(label))
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_label(&self) -> Option<&str> {
        self.undo_stack.last().map(|e| e.label.as_str())
    }

    pub fn redo_label(&self) -> Option<&str> {
        self.redo_stack.last().map(|e| e.label.as_str())
    }

    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }

    /// Every command either stack still holds, selection captures included
    pub fn commands(&self) -> impl Iterator<Item = &C> {
        self.undo_stack
            .iter()
            .chain(self.redo_stack.iter())
            .flat_map(|e| e.commands.iter().chain(e.before.iter()).chain(e.after.iter()))
    }

    fn enforce_limit(&mut self) {
        if let Some(limit) = self.limit {
            if self.undo_stack.len() > limit {
                let excess = self.undo_stack.len() - limit;
                self.undo_stack.drain(..excess);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Push/pop on a plain vector, enough to exercise grouping
    #[derive(Debug, Clone, PartialEq)]
    enum VecCommand {
        Push(i32),
        Pop,
        Fail,
    }

    impl Command for VecCommand {
        type Target = Vec<i32>;
        type Error = String;

        fn apply(self, target: &mut Vec<i32>) -> Result<Self, String> {
            match self {
                VecCommand::Push(v) => {
                    target.push(v);
                    Ok(VecCommand::Pop)
                }
                VecCommand::Pop => target.pop().map(VecCommand::Push).ok_or("empty".into()),
                VecCommand::Fail => Err("fail".into()),
            }
        }
    }

    #[test]
    fn commands_cover_both_stacks() {
        let mut history = CommandHistory::new();
        let mut v = vec![];
        history.apply(&mut v, "a", VecCommand::Push(1)).unwrap();
        history.apply(&mut v, "b", VecCommand::Push(2)).unwrap();
        history.undo(&mut v).unwrap();
        let held: Vec<_> = history.commands().cloned().collect();
        assert_eq!(held, vec![VecCommand::Pop, VecCommand::Push(2)]);
        history.apply(&mut v, "c", VecCommand::Push(3)).unwrap();
        assert_eq!(history.commands().count(), 2);
    }

    #[test]
    fn groups_undo_and_redo_as_one_step() {
        let mut history = CommandHistory::new();
        let mut v = vec![];
        history
            .transact(&mut v, "push two", |tx| {
                tx.apply(VecCommand::Push(1))?;
                tx.apply(VecCommand::Push(2))
            })
            .unwrap();
        assert_eq!(v, vec![1, 2]);
        assert_eq!(history.undo(&mut v).unwrap().as_deref(), Some("push two"));
        assert!(v.is_empty());
        assert_eq!(history.redo(&mut v).unwrap().as_deref(), Some("push two"));
        assert_eq!(v, vec![1, 2]);
        assert_eq!(history.undo_depth(), 1);
    }

    #[test]
    fn failed_group_rolls_back_and_records_nothing() {
        let mut history = CommandHistory::new();
        let mut v = vec![7];
        let result = history.transact(&mut v, "broken", |tx| {
            tx.apply(VecCommand::Push(1))?;
            tx.apply(VecCommand::Fail)
        });
        assert!(result.is_err());
        assert_eq!(v, vec![7]);
        assert!(!history.can_undo());
    }

    #[test]
    fn empty_group_is_not_recorded_and_keeps_redo() {
        let mut history = CommandHistory::new();
        let mut v = vec![];
        history.apply(&mut v, "push", VecCommand::Push(3)).unwrap();
        history.undo(&mut v).unwrap();
        history.transact(&mut v, "noop", |_| Ok(())).unwrap();
        assert!(history.can_redo());
    }

    #[test]
    fn new_group_clears_redo() {
        let mut history = CommandHistory::new();
        let mut v = vec![];
        history.apply(&mut v, "a", VecCommand::Push(1)).unwrap();
        history.undo(&mut v).unwrap();
        history.apply(&mut v, "b", VecCommand::Push(2)).unwrap();
        assert!(!history.can_redo());
        assert_eq!(history.redo(&mut v).unwrap(), None);
    }

    #[test]
    fn limit_drops_oldest_steps() {
        let mut history = CommandHistory::with_limit(2);
        let mut v = vec![];
        for i in 0..4 {
            history.apply(&mut v, format!("push {i}"), VecCommand::Push(i)).unwrap();
        }
        assert_eq!(history.undo_depth(), 2);
        history.undo(&mut v).unwrap();
        history.undo(&mut v).unwrap();
        assert_eq!(v, vec![0, 1]);
        assert_eq!(history.undo(&mut v).unwrap(), None);
    }
}
