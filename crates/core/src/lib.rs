//! Core abstractions for quill: tasks, prompts, the model registry and
//! stream assembly.

pub use {
    assemble::{Assembler, State, trim_symbols},
    chunk::{FinishReason, ResponseChunk, Usage},
    error::{Error, Result},
    event::{EventHandler, NoopEvents, StopReason, TracingEvents},
    model::Model,
    prompt::{StaticTemplates, TemplateProvider, Templates, resolve},
    registry::{Entry, Registry, Selection},
    task::{
        Completion, DEFAULT_END_SYMBOL, DEFAULT_START_SYMBOL, DEFAULT_TIMEOUT, NormalizedInput,
        PromptInput, Step, StreamCompletion, TextCompletion, normalize,
    },
    transport::{ChunkStream, Request, Transport},
};

mod assemble;
mod chunk;
mod error;
mod event;
mod model;
mod prompt;
mod registry;
mod task;
mod transport;

#[cfg(feature = "testing")]
pub mod testing;
