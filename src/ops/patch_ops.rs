use crate::model::patch::{PatchError, PatchSeries};
use crate::parse::mail_header::MailInfo;

/// Parse the metadata of every patch in the series.
///
/// Stops at the first patch that cannot be parsed; patches before it keep
/// their parsed metadata.
pub fn collect_patch_info(series: &mut PatchSeries, mailinfo: &dyn MailInfo) -> Result<(), PatchError> {
    for patch in series.iter_mut() {
        if let Err(err) = patch.info(mailinfo).map(|_| ()) {
            return Err(PatchError::Batch {
                path: patch.path.clone(),
                source: Box::new(err),
            });
        }
    }
    tracing::debug!("parsed metadata of {} patches", series.len());
    Ok(())
}
