use std::future::Future;

use log::info;
use tokio::task::JoinHandle;

use crate::error::ProbeError;
use crate::report::{self, Report};
use crate::telemetry;

pub mod builtin;

/// A one-shot network operation whose outcome is reported, never retried.
pub trait Probe: Send + Sync + 'static {
    type Output: Report + Send + 'static;

    /// Short name used in logs and metric attributes.
    fn name(&self) -> &'static str;

    fn run(&self) -> impl Future<Output = Result<Self::Output, ProbeError>> + Send;
}

/// Run `probe` as an independent task.
///
/// The task prints its own outcome as soon as it completes, then hands the
/// outcome back through the join handle. The probe counts as active until
/// its outcome is printed.
pub fn spawn_probe<P: Probe>(probe: P) -> JoinHandle<Result<P::Output, ProbeError>> {
    let name = probe.name();
    telemetry::record_active_probe(name, 1);
    info!("Starting {name} probe");

    tokio::spawn(async move {
        let outcome = probe.run().await;
        report::emit(probe.name(), &outcome);
        telemetry::record_active_probe(probe.name(), 0);
        outcome
    })
}
