use std::time::Duration;

use tracing::{debug, info};

use super::run_checked;
use crate::Result;
use crate::parser;
use crate::tool::{Invocation, ToolRunner};
use crate::types::{DomainCredentials, Pin};

/// Relying party domains from the `= <domain>` lines of the domain listing
pub fn parse_domains(output: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(parser::trailing_assignment)
        .map(|domain| domain.trim().to_string())
        .filter(|domain| !domain.is_empty())
        .collect()
}

/// List the relying party domains holding resident credentials
pub async fn list_domains(
    runner: &dyn ToolRunner,
    handle: &str,
    pin: Option<&Pin>,
    timeout: Duration,
) -> Result<Vec<String>> {
    let output = run_checked(runner, &Invocation::list_domains(handle, pin), timeout).await?;
    Ok(parse_domains(&output.stdout))
}

/// List every resident credential, grouped by domain
///
/// Runs the domain listing, then one credential listing per domain. The
/// first failure aborts the whole walk and nothing gathered so far is
/// returned.
pub async fn list_credentials(
    runner: &dyn ToolRunner,
    handle: &str,
    pin: Option<&Pin>,
    timeout: Duration,
) -> Result<Vec<DomainCredentials>> {
    let domains = list_domains(runner, handle, pin, timeout).await?;
    debug!("{} holds credentials for {} domain(s)", handle, domains.len());

    let mut aggregated = Vec::with_capacity(domains.len());
    for domain in &domains {
        let invocation = Invocation::list_credentials(handle, pin, domain);
        let output = run_checked(runner, &invocation, timeout).await?;
        aggregated.push(DomainCredentials::parse(domain, &output.stdout));
    }

    info!(
        "Listed {} credential(s) on {}",
        aggregated.iter().map(|d| d.credentials.len()).sum::<usize>(),
        handle
    );
    Ok(aggregated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::ErrorKind;
    use crate::testing::{FakeRunner, failed, ok};

    const DOMAINS: &str = "\
00: Zm9vYmFy4a1c2b3d4e5f6a7b8c9d0e1f2a3b4c5d6e7f8091a2b3c4d5e6f708 = github.com
01: q2v3c4d5e6f7a8b9c0d1e2f3a4b5c6d7e8f9a0b1c2d3e4f5a6b7c8d9e0f1a2b3 = login.microsoft.com
";

    #[test]
    fn test_domains_from_trailing_assignment() {
        assert_eq!(parse_domains(DOMAINS), ["github.com", "login.microsoft.com"]);
        assert!(parse_domains("").is_empty());
    }

    #[tokio::test]
    async fn test_walks_every_domain() {
        let runner = FakeRunner::new(|inv| match inv.operation() {
            "list domains" => ok(DOMAINS),
            _ if inv.args().contains(&"github.com".to_string()) => {
                ok("00: AbCdEf== octocat (null) es256 uvopt+id\n")
            }
            _ => ok("00: ZyXw== alice@contoso.com es256 uvopt+id\n01: QrSt== bob smith bob@contoso.com x es256\n"),
        });

        let domains = list_credentials(&runner, "/dev/hidraw0", Some(&Pin::new("1234")), Duration::from_secs(1))
            .await
            .unwrap();

        assert_eq!(domains.len(), 2);
        assert_eq!(domains[0].domain, "github.com");
        assert_eq!(domains[0].credentials[0].credential_id, "AbCdEf==");
        assert_eq!(domains[1].credentials.len(), 2);
        assert_eq!(domains[1].credentials[0].email, "alice@contoso.com es256");
        assert_eq!(domains[1].credentials[1].user, "bob smith");

        let calls = runner.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(
            calls[2].args(),
            ["-L", "-k", "login.microsoft.com", "-w", "1234", "/dev/hidraw0"]
        );
    }

    #[tokio::test]
    async fn test_failure_on_second_domain_discloses_nothing() {
        let runner = FakeRunner::new(|inv| match inv.operation() {
            "list domains" => ok(DOMAINS),
            _ if inv.args().contains(&"github.com".to_string()) => ok("00: AbCdEf== octocat\n"),
            _ => failed("fido2-token: fido_credman_get_dev_rk: FIDO_ERR_PIN_AUTH_BLOCKED"),
        });

        let err = list_credentials(&runner, "/dev/hidraw0", Some(&Pin::new("1234")), Duration::from_secs(1))
            .await
            .unwrap_err();

        assert_eq!(err.classified().unwrap().kind, ErrorKind::PinAuthBlocked);
        assert_eq!(runner.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_no_domains_means_no_credentials() {
        let runner = FakeRunner::new(|_| ok(""));
        let domains = list_credentials(&runner, "/dev/hidraw0", None, Duration::from_secs(1))
            .await
            .unwrap();
        assert!(domains.is_empty());
        assert_eq!(runner.calls().len(), 1);
    }
}
