//! Discovery of VMs already resident in the process.

use crate::embedding::{EmbeddingInterface, VmPtr};
use crate::error::{Error, Result};

/// Upper bound on the number of VMs a single query reports.
pub const MAX_VMS: usize = 32;

/// List the VMs already created in this process, up to [`MAX_VMS`].
///
/// A non-zero status from the embedding interface is a [`Error::Query`].
pub fn locate(iface: &dyn EmbeddingInterface) -> Result<Vec<VmPtr>> {
    let vms = iface
        .created_vms(MAX_VMS)
        .map_err(|status| Error::Query { status })?;

    tracing::debug!(count = vms.len(), "queried resident VMs");
    Ok(vms)
}
