pub mod executor;
pub mod scenario;
pub mod synthetic;

pub use executor::{QueryExecutor, QueryRequest};
pub use scenario::{InMemoryScenarios, ScenarioExecutor, ScenarioSource, TicketScenario};
pub use synthetic::SyntheticExecutor;
