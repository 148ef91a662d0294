/// A resident credential (passkey) stored on the authenticator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialRecord {
    /// Relying party identifier
    pub domain: String,
    pub credential_id: String,
    pub user: String,
    pub email: String,
}

impl CredentialRecord {
    /// Parse one line of the per-domain credential listing
    ///
    /// Tokens are `<index> <credential id> <user...> <email...>`. The split of
    /// the trailing tokens is a best-effort heuristic: up to two tokens form
    /// the user field and, when there are enough, the next two the email
    /// field. A user field containing `@` is taken as the email. Lines with
    /// fewer than three tokens yield `None`.
    pub fn from_listing_line(domain: &str, line: &str) -> Option<Self> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 3 {
            return None;
        }

        let credential_id = parts[1].to_string();
        let mut user_field = if parts.len() > 3 {
            parts[2..4].join(" ")
        } else {
            parts[2].to_string()
        };
        let email_field = if parts.len() > 5 {
            parts[4..6].join(" ")
        } else {
            String::new()
        };

        if user_field == "(null)" {
            user_field.clear();
        }

        let (user, email) = if user_field.contains('@') {
            (String::new(), user_field)
        } else {
            (user_field, email_field)
        };

        Some(Self {
            domain: domain.to_string(),
            credential_id,
            user,
            email,
        })
    }
}

/// Credentials of one relying party
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainCredentials {
    pub domain: String,
    pub credentials: Vec<CredentialRecord>,
}

impl DomainCredentials {
    /// Parse the full credential listing of `domain`
    pub fn parse(domain: &str, output: &str) -> Self {
        let credentials = output
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| CredentialRecord::from_listing_line(domain, line))
            .collect();
        Self {
            domain: domain.to_string(),
            credentials,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_name_with_trailing_email() {
        let record = CredentialRecord::from_listing_line(
            "example.com",
            "00: AbCd== alice x dXNlcg== alice@example.com es256",
        )
        .unwrap();
        assert_eq!(record.credential_id, "AbCd==");
        assert_eq!(record.user, "alice x");
        assert_eq!(record.email, "dXNlcg== alice@example.com");
    }

    #[test]
    fn test_user_field_with_at_sign_is_email() {
        let record =
            CredentialRecord::from_listing_line("github.com", "01: Zm9v bob@mail.test es256")
                .unwrap();
        assert_eq!(record.user, "");
        assert_eq!(record.email, "bob@mail.test es256");
    }

    #[test]
    fn test_null_user_normalizes_to_empty() {
        let record = CredentialRecord::from_listing_line("login.test", "02: Q3JlZA (null)").unwrap();
        assert_eq!(record.user, "");
        assert_eq!(record.email, "");
        assert_eq!(record.domain, "login.test");
    }

    #[test]
    fn test_short_lines_are_skipped() {
        assert_eq!(CredentialRecord::from_listing_line("d", "00: only"), None);
        let parsed = DomainCredentials::parse("d", "\n00: only\n\n01: id user\n");
        assert_eq!(parsed.credentials.len(), 1);
        assert_eq!(parsed.credentials[0].user, "user");
    }

    // Known limitation of the heuristic: a display name with more than two
    // words spills into the email field.
    #[test]
    fn test_multi_word_names_are_split_by_position() {
        let record =
            CredentialRecord::from_listing_line("d", "00: id Mary Ann Smith x es256").unwrap();
        assert_eq!(record.user, "Mary Ann");
        assert_eq!(record.email, "Smith x");
    }
}
