#[path = "builder/state.rs"]
mod state;

#[path = "builder/chat_builder.rs"]
mod chat_builder;

#[path = "builder/resilience.rs"]
mod resilience;

#[path = "builder/build.rs"]
mod build;

pub use chat_builder::ChatClientBuilder;
