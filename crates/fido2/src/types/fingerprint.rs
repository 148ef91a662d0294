/// An enrolled fingerprint template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FingerprintTemplate {
    pub template_id: String,
    /// Friendly name, empty when none was set
    pub name: String,
}

impl TryFrom<&str> for FingerprintTemplate {
    type Error = anyhow::Error;

    /// Parse a `<index>: <template id> <name...>` line
    fn try_from(line: &str) -> Result<Self, Self::Error> {
        let (_, rest) = line
            .split_once(':')
            .ok_or_else(|| anyhow::Error::msg("Missing template index"))?;
        let mut tokens = rest.split_whitespace();
        let template_id = tokens
            .next()
            .ok_or_else(|| anyhow::Error::msg("Missing template id"))?
            .to_string();
        let name = tokens.collect::<Vec<_>>().join(" ");

        Ok(Self { template_id, name })
    }
}
