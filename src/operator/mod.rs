// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Single-resource reconciliation primitives.
//!
//! [`resource::ResourceOperator`] converges one named Kubernetes resource
//! toward a desired manifest (or toward absence) with at most one API
//! mutation per call. [`workload`] adds the scale and rolling-restart
//! operations that StatefulSets and Deployments need on top of that.

pub mod resource;
pub mod workload;

pub use resource::{Outcome, ResourceOperator};
pub use workload::{scale_down, scale_up, HasReplicas, RollingUpdater};
