//! sysdesign-core: evaluation engine for the system-design game.
//!
//! A player's `Design` (components and directed connections) is scored
//! against a `Scenario` (scripted traffic phases and goals) at one
//! instant. See `engine` for the execution order.

pub mod catalog;
pub mod component;
pub mod config;
pub mod demand;
pub mod design;
pub mod engine;
pub mod error;
pub mod evaluation;
pub mod event;
pub mod flow;
pub mod graph;
pub mod potential;
pub mod resources;
pub mod rng;
pub mod scenario;
pub mod scoring;
pub mod service;
pub mod session;
pub mod state;
pub mod store;
pub mod traffic;
pub mod types;
pub mod walker;
pub mod world;
