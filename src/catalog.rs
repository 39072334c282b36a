//! Catalogue of command identifiers understood by this side of the link.
//!
//! Each feature family owns one main command identifier and a set of sub
//! identifiers, some of which are request/response calls and some of which
//! are unsolicited events raised by the modem. Frames whose identifier pair
//! is not catalogued are rejected by the codec as unknown.

use std::collections::HashMap;

use crate::correlation::CommandId;

/// Role of a catalogued identifier pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandKind {
    /// Request issued by the application processor and answered by the modem.
    Call,
    /// Notification raised by the modem without a preceding request.
    Event,
}

/// Static description of a feature family.
///
/// # Examples
///
/// ```
/// use altcom::catalog::{CommandCatalog, CommandKind, FeatureFamily};
/// use altcom::correlation::CommandId;
///
/// struct Clock;
///
/// impl FeatureFamily for Clock {
///     const MAIN_ID: u16 = 0x0300;
///     const CALLS: &'static [u16] = &[0x01];
///     const EVENTS: &'static [u16] = &[0x80];
/// }
///
/// let catalog = CommandCatalog::builder().family::<Clock>().build();
/// assert_eq!(catalog.kind(CommandId::new(0x0300, 0x80)), Some(CommandKind::Event));
/// ```
pub trait FeatureFamily {
    /// Main command identifier owned by the family.
    const MAIN_ID: u16;
    /// Sub identifiers answered with a response.
    const CALLS: &'static [u16];
    /// Sub identifiers delivered as unsolicited events.
    const EVENTS: &'static [u16] = &[];

    /// Identifier of one of this family's operations.
    #[must_use]
    fn command(sub: u16) -> CommandId { CommandId::new(Self::MAIN_ID, sub) }
}

/// Immutable set of known identifier pairs.
#[derive(Clone, Debug, Default)]
pub struct CommandCatalog {
    entries: HashMap<CommandId, CommandKind>,
}

impl CommandCatalog {
    /// Start an empty catalogue.
    #[must_use]
    pub fn builder() -> CatalogBuilder { CatalogBuilder::default() }

    /// Catalogue containing every feature family shipped with this crate.
    #[must_use]
    pub fn standard() -> Self { crate::feature::register_all(Self::builder()).build() }

    /// Role of `command`, or `None` when it is not catalogued.
    #[must_use]
    pub fn kind(&self, command: CommandId) -> Option<CommandKind> {
        self.entries.get(&command).copied()
    }

    /// Whether `command` is known at all.
    #[must_use]
    pub fn contains(&self, command: CommandId) -> bool { self.entries.contains_key(&command) }

    /// Whether `command` is a catalogued event kind.
    #[must_use]
    pub fn is_event(&self, command: CommandId) -> bool {
        self.kind(command) == Some(CommandKind::Event)
    }

    /// Iterate over every catalogued pair.
    pub fn iter(&self) -> impl Iterator<Item = (CommandId, CommandKind)> + '_ {
        self.entries.iter().map(|(id, kind)| (*id, *kind))
    }

    /// Number of catalogued pairs.
    #[must_use]
    pub fn len(&self) -> usize { self.entries.len() }

    /// Whether the catalogue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }
}

/// Builder collecting identifier pairs for a [`CommandCatalog`].
#[derive(Debug, Default)]
pub struct CatalogBuilder {
    entries: HashMap<CommandId, CommandKind>,
}

impl CatalogBuilder {
    /// Register a request/response pair.
    #[must_use]
    pub fn call(mut self, command: CommandId) -> Self {
        self.insert(command, CommandKind::Call);
        self
    }

    /// Register an unsolicited event pair.
    #[must_use]
    pub fn event(mut self, command: CommandId) -> Self {
        self.insert(command, CommandKind::Event);
        self
    }

    /// Register every pair of a feature family.
    #[must_use]
    pub fn family<F: FeatureFamily>(mut self) -> Self {
        for sub in F::CALLS {
            self.insert(F::command(*sub), CommandKind::Call);
        }
        for sub in F::EVENTS {
            self.insert(F::command(*sub), CommandKind::Event);
        }
        self
    }

    /// Freeze the collected pairs.
    #[must_use]
    pub fn build(self) -> CommandCatalog {
        CommandCatalog {
            entries: self.entries,
        }
    }

    fn insert(&mut self, command: CommandId, kind: CommandKind) {
        match self.entries.insert(command, kind) {
            Some(previous) if previous != kind => {
                tracing::warn!(%command, ?previous, ?kind, "catalogue entry reclassified");
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Modem;

    impl FeatureFamily for Modem {
        const MAIN_ID: u16 = 0x0900;
        const CALLS: &'static [u16] = &[0x01, 0x02];
        const EVENTS: &'static [u16] = &[0x80];
    }

    #[test]
    fn family_registers_calls_and_events() {
        let catalog = CommandCatalog::builder().family::<Modem>().build();
        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.kind(CommandId::new(0x0900, 0x02)), Some(CommandKind::Call));
        assert!(catalog.is_event(CommandId::new(0x0900, 0x80)));
        assert!(!catalog.contains(CommandId::new(0x0900, 0x03)));
    }

    #[test]
    fn later_registration_overrides_kind() {
        let id = CommandId::new(0x0901, 0x01);
        let catalog = CommandCatalog::builder().call(id).event(id).build();
        assert!(catalog.is_event(id));
    }

    #[test]
    fn standard_catalogue_contains_entropy_init() {
        let catalog = CommandCatalog::standard();
        assert_eq!(
            catalog.kind(crate::feature::entropy::INIT),
            Some(CommandKind::Call)
        );
    }
}
