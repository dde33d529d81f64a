//! Board registry: protocol identifier -> board constructor

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use super::{AllenHeathModel, BoardContext, BoardPlugin, Command8Model, ConsoleBoard, XAirMidiModel, XAirOscModel};
use crate::error::{MixerError, Result};
use crate::protocol::{MidiAdapter, OscAdapter};

/// Builds a board bound to a session's context
pub type BoardFactory = Arc<dyn Fn(BoardContext) -> Arc<dyn BoardPlugin> + Send + Sync>;

/// Known boards, keyed by protocol identifier (e.g. `"xair-osc"`)
#[derive(Clone, Default)]
pub struct BoardRegistry {
    factories: BTreeMap<String, BoardFactory>,
}

impl BoardRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every console this crate ships support for
    pub fn with_builtin_boards() -> Self {
        let mut registry = Self::new();

        registry.register("xair-midi", |ctx| {
            let adapter = Arc::new(MidiAdapter::new(&ctx.options.client_name, ctx.options.nrpn_timeout));
            let model = XAirMidiModel::new(ctx.options.midi_channel);
            Arc::new(ConsoleBoard::new("xair-midi", model, adapter, ctx))
        });
        registry.register("xair-osc", |ctx| {
            Arc::new(ConsoleBoard::new("xair-osc", XAirOscModel::new(), Arc::new(OscAdapter::new()), ctx))
        });
        registry.register("qu24", |ctx| {
            let adapter = Arc::new(MidiAdapter::new(&ctx.options.client_name, ctx.options.nrpn_timeout));
            let model = AllenHeathModel::qu24(ctx.options.midi_channel);
            Arc::new(ConsoleBoard::new("qu24", model, adapter, ctx))
        });
        registry.register("gld80", |ctx| {
            let adapter = Arc::new(MidiAdapter::new(&ctx.options.client_name, ctx.options.nrpn_timeout));
            let model = AllenHeathModel::gld80(ctx.options.midi_channel);
            Arc::new(ConsoleBoard::new("gld80", model, adapter, ctx))
        });
        registry.register("command8", |ctx| {
            let adapter = Arc::new(MidiAdapter::new(&ctx.options.client_name, ctx.options.nrpn_timeout));
            Arc::new(ConsoleBoard::new("command8", Command8Model::new(), adapter, ctx))
        });

        registry
    }

    /// Add or replace a board
    pub fn register<F>(&mut self, id: impl Into<String>, factory: F)
    where
        F: Fn(BoardContext) -> Arc<dyn BoardPlugin> + Send + Sync + 'static,
    {
        let id = id.into();
        debug!("Registering board '{}'", id);
        self.factories.insert(id, Arc::new(factory));
    }

    pub fn contains(&self, id: &str) -> bool {
        self.factories.contains_key(id)
    }

    /// Registered identifiers, sorted
    pub fn ids(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    /// Instantiate the board registered under `id`
    pub fn create(&self, id: &str, ctx: BoardContext) -> Result<Arc<dyn BoardPlugin>> {
        let factory = self
            .factories
            .get(id)
            .ok_or_else(|| MixerError::UnknownBoard(id.to_string()))?;
        Ok(factory(ctx))
    }
}
