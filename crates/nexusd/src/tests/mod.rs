//! Behavioural suites for the orchestrator, workers and router.

mod supervisor_behaviour;
mod support;
