// crates/migration-gate-providers/src/lib.rs
// ============================================================================
// Crate: migration-gate-providers
// Description: Reasoner implementations and a reference BrowserDriver.
// ============================================================================

//! Implementations of the capability traits `migration-gate-core` defines:
//! a real LLM-backed `Reasoner`, a deterministic rule-based fallback, and a
//! fetch-based `BrowserDriver` reference implementation used by tests and by
//! deployments that have not wired in a real browser automation backend.

pub mod fetch_driver;
pub mod llm;
pub mod rule_based;

pub use fetch_driver::FetchBrowserDriver;
pub use llm::LlmReasoner;
pub use llm::LlmReasonerConfig;
pub use llm::extract_first_balanced_json_object;
pub use rule_based::RuleBasedReasoner;
