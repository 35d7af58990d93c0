//! stoker-core
//!
//! A local job-execution pool: submit callables, run them on a group of
//! workers with per-task output capture, and aggregate lifecycle status
//! through events until every task is terminal.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, status, task, events）
//! - **queue**: dispatch queue（controller → workers）
//! - **capture**: output capture bridge（in-band completion marker）
//! - **worker**: worker group + per-task execution loop
//! - **pool**: registry, controller loop, public lifecycle API
//! - **sink**: optional per-task log persistence
//! - **remote**: one-shot server bootstrap (spawn + readiness probe)

pub mod capture;
pub mod domain;
pub mod error;
pub mod pool;
pub mod queue;
pub mod remote;
pub mod sink;
pub mod worker;
