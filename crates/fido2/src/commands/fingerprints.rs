use std::time::Duration;

use tracing::debug;

use super::run_checked;
use crate::Result;
use crate::tool::{Invocation, ToolRunner};
use crate::types::{FingerprintTemplate, Pin};

/// Templates from the bio enrollment listing; malformed lines are skipped
pub fn parse_templates(output: &str) -> Vec<FingerprintTemplate> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match FingerprintTemplate::try_from(line) {
            Ok(template) => Some(template),
            Err(err) => {
                debug!("Skipping template line {:?}: {}", line, err);
                None
            }
        })
        .collect()
}

/// List the enrolled fingerprint templates
pub async fn list_fingerprints(
    runner: &dyn ToolRunner,
    handle: &str,
    pin: Option<&Pin>,
    timeout: Duration,
) -> Result<Vec<FingerprintTemplate>> {
    let output = run_checked(runner, &Invocation::list_fingerprints(handle, pin), timeout).await?;
    Ok(parse_templates(&output.stdout))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::ErrorKind;
    use crate::testing::{FakeRunner, failed, ok};

    #[tokio::test]
    async fn test_lists_templates() {
        let runner = FakeRunner::new(|_| ok("00: 3f2a right thumb\n01: 9c01\n\n"));
        let templates = list_fingerprints(&runner, "/dev/hidraw2", Some(&Pin::new("1234")), Duration::from_secs(1))
            .await
            .unwrap();

        assert_eq!(templates.len(), 2);
        assert_eq!(templates[0].name, "right thumb");
        assert_eq!(templates[1].template_id, "9c01");
        assert_eq!(runner.calls()[0].args(), ["-L", "-e", "-w", "1234", "/dev/hidraw2"]);
    }

    #[tokio::test]
    async fn test_pin_required() {
        let runner = FakeRunner::new(|_| failed("fido2-token: fido_bio_dev_get_info: FIDO_ERR_PIN_REQUIRED"));
        let err = list_fingerprints(&runner, "/dev/hidraw2", None, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert_eq!(err.classified().unwrap().kind, ErrorKind::PinRequired);
    }
}
