//! # hybrid-rs: Hybrid Automata and Continuization in Rust
//!
//! **`hybrid-rs`** is an intermediate representation for **hybrid automata** together with a
//! pipeline of model transformation passes. Its centerpiece is **continuization**: replacing a
//! periodically sampled controller output by its continuous counterpart plus a bounded sampling
//! error, so that the model can be handed to tools that only understand continuous dynamics.
//!
//! ## What is a Hybrid Automaton?
//!
//! A hybrid automaton combines discrete **modes** with continuous dynamics. Inside a mode the
//! variables evolve according to the mode's **flow** (`x' = f(x)`) as long as its **invariant**
//! holds; a **transition** may fire when its **guard** holds, optionally **resetting** variables.
//! Flows may carry an additive uncertainty interval (`x' = v + [-0.04, 0.16]`).
//!
//! ## Key Features
//!
//! - **Expression IR**: [`Expr`][crate::expr::Expr] with parsing, printing, simplification,
//!   interval evaluation and symbolic differentiation.
//! - **Component tree**: flat automata ([`BaseComponent`][crate::automaton::BaseComponent]) and
//!   networks of them ([`Component`][crate::component::Component]), validated by
//!   [`Configuration::validate`][crate::config::Configuration::validate].
//! - **Passes**: a registry of transformations selected by flag, run atomically by a
//!   [`Pipeline`][crate::passes::Pipeline].
//! - **Pluggable estimation**: the numeric backend is any
//!   [`RangeEstimator`][crate::estimator::RangeEstimator] carried by the run's
//!   [`Context`][crate::context::Context].
//!
//! ## Basic Usage
//!
//! ```rust
//! use hybrid_rs::context::Context;
//! use hybrid_rs::generate::debug_configuration;
//! use hybrid_rs::passes::{Pipeline, Registry};
//!
//! // 1. Build a model: a double integrator whose input `a` follows a feedback law
//! let mut config = debug_configuration(&[
//!     ["x", "v", "0.05"],
//!     ["v", "a", "0"],
//!     ["a", "-10 * v - 3 * a", "9.5"],
//! ])
//! .unwrap();
//!
//! // 2. Continuize `a`, sampled every 5 ms, over two time windows
//! let registry = Registry::new();
//! let mut pipeline = Pipeline::new();
//! pipeline
//!     .push(&registry, "continuize", "--var a --period 0.005 --times 1.5 5 --bloats 4 4")
//!     .unwrap();
//! pipeline.run(&mut config, &Context::default()).unwrap();
//!
//! // 3. Two window modes, each guarded by two error modes
//! let base = config.root_base().unwrap();
//! assert_eq!(base.modes.len(), 6);
//! assert!(base.mode("on_2").is_some());
//! ```
//!
//! ## Core Components
//!
//! - **[`continuize`]**: the continuization engine (event- and time-triggered).
//! - **[`passes`]**: the pass framework and every pass.
//! - **[`estimator`]**: derivative range estimation backends.
//! - **[`dot`]**: Graphviz rendering for inspection.

pub mod automaton;
pub mod component;
pub mod config;
pub mod context;
pub mod continuize;
pub mod dot;
pub mod error;
pub mod estimator;
pub mod expr;
pub mod expr_interval;
pub mod generate;
pub mod interval;
pub mod parser;
pub mod passes;
pub mod printer;
pub mod simulate;
