use async_trait::async_trait;

use super::FabricControlPlane;
use crate::error::{Result, ZtpError};
use crate::models::{Attributes, ObjectKind, Record, Scope};
use crate::utils;

const FIELD_DELIM: char = ';';

/// Credentials and entry point for the Netvisor CLI, passed by value
#[derive(Debug, Clone)]
pub struct CliSession {
    /// Switch reachable over SSH that runs the fabric-wide CLI
    pub host: String,
    pub username: String,
    pub password: String,
    pub timeout_secs: u64,
}

impl CliSession {
    /// `cli --quiet` prefix, with `--user` when credentials are set
    fn prefix(&self) -> String {
        if !self.username.is_empty() && !self.password.is_empty() {
            format!("/usr/bin/cli --quiet --user {}:{}", self.username, self.password)
        } else {
            "/usr/bin/cli --quiet".to_string()
        }
    }
}

/// Control plane backed by the Netvisor CLI over SSH
pub struct NetvisorCli {
    session: CliSession,
}

impl NetvisorCli {
    pub fn new(session: CliSession) -> Self {
        Self { session }
    }

    /// Render a request as a CLI command line
    fn render(&self, scope: &Scope, kind: ObjectKind, verb: &str, attrs: &Attributes) -> String {
        let mut cmd = self.session.prefix();
        if let Scope::Switch(name) = scope {
            cmd.push_str(" switch ");
            cmd.push_str(name);
        }
        cmd.push(' ');
        cmd.push_str(kind.stem());
        cmd.push('-');
        cmd.push_str(verb);
        for (key, value) in attrs.iter() {
            cmd.push(' ');
            cmd.push_str(key);
            if !value.is_empty() {
                cmd.push(' ');
                cmd.push_str(value);
            }
        }
        cmd
    }

    fn render_show(&self, scope: &Scope, kind: ObjectKind, filters: &Attributes) -> String {
        format!(
            "{} format {} no-show-headers parsable-delim {}",
            self.render(scope, kind, "show", filters),
            kind.fields().join(","),
            FIELD_DELIM
        )
    }

    async fn run(&self, scope: &Scope, command: String) -> Result<String> {
        tracing::debug!("[{}] {}", scope.label(), redact(&command, &self.session.password));
        let output = utils::ssh_run_command_async(
            &self.session.host,
            &self.session.username,
            &self.session.password,
            &command,
            self.session.timeout_secs,
        )
        .await
        .map_err(|e| ZtpError::unreachable(scope.label(), e))?;

        if output.exit_status != 0 {
            let message = if output.stderr.trim().is_empty() {
                format!("exit status {}", output.exit_status)
            } else {
                output.stderr.trim().to_string()
            };
            return Err(ZtpError::CommandFailed {
                switch: scope.label().to_string(),
                message,
            });
        }
        Ok(output.stdout)
    }
}

/// Parse delimited show output into records keyed by `fields`.
/// Some show commands prepend a switch or vrouter column, so the
/// trailing columns are the requested ones.
pub fn parse_show_output(output: &str, fields: &[&str]) -> Vec<Record> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            let columns: Vec<&str> = line.split(FIELD_DELIM).map(str::trim).collect();
            let skip = columns.len().saturating_sub(fields.len());
            let mut record = Record::new();
            for (field, value) in fields.iter().zip(columns.iter().skip(skip)) {
                record.insert(field, *value);
            }
            record
        })
        .collect()
}

fn redact(command: &str, password: &str) -> String {
    if password.is_empty() {
        command.to_string()
    } else {
        command.replace(password, "****")
    }
}

#[async_trait]
impl FabricControlPlane for NetvisorCli {
    async fn query(&self, scope: &Scope, kind: ObjectKind, filters: &Attributes) -> Result<Vec<Record>> {
        let output = self.run(scope, self.render_show(scope, kind, filters)).await?;
        Ok(parse_show_output(&output, kind.fields()))
    }

    async fn create(&self, scope: &Scope, kind: ObjectKind, attrs: &Attributes) -> Result<()> {
        self.run(scope, self.render(scope, kind, kind.create_verb(), attrs)).await?;
        Ok(())
    }

    async fn modify(&self, scope: &Scope, kind: ObjectKind, attrs: &Attributes) -> Result<()> {
        self.run(scope, self.render(scope, kind, "modify", attrs)).await?;
        Ok(())
    }

    async fn delete(&self, scope: &Scope, kind: ObjectKind, attrs: &Attributes) -> Result<()> {
        self.run(scope, self.render(scope, kind, kind.delete_verb(), attrs)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(user: &str, pass: &str) -> NetvisorCli {
        NetvisorCli::new(CliSession {
            host: "10.9.9.1".to_string(),
            username: user.to_string(),
            password: pass.to_string(),
            timeout_secs: 30,
        })
    }

    #[test]
    fn test_render_trunk_create() {
        let attrs = Attributes::new()
            .with("name", "leaf1-to-spine1spine2")
            .with("ports", "1,2,3");
        let cmd = cli("", "").render(&Scope::switch("leaf1"), ObjectKind::Trunk, "create", &attrs);
        assert_eq!(
            cmd,
            "/usr/bin/cli --quiet switch leaf1 trunk-create name leaf1-to-spine1spine2 ports 1,2,3"
        );
    }

    #[test]
    fn test_render_show_with_credentials_and_flags() {
        let cmd = cli("network-admin", "secret").render_show(
            &Scope::Fabric,
            ObjectKind::Cluster,
            &Attributes::new(),
        );
        assert_eq!(
            cmd,
            "/usr/bin/cli --quiet --user network-admin:secret cluster-show format name,cluster-node-1,cluster-node-2 no-show-headers parsable-delim ;"
        );

        let flags = Attributes::new().flag("no-auto-trunk");
        let cmd = cli("", "").render(&Scope::switch("spine1"), ObjectKind::SystemSettings, "modify", &flags);
        assert!(cmd.ends_with("switch spine1 system-settings-modify no-auto-trunk"));
    }

    #[test]
    fn test_interface_verbs() {
        assert_eq!(ObjectKind::VrouterInterface.create_verb(), "add");
        assert_eq!(ObjectKind::VrouterBgp.delete_verb(), "remove");
        assert_eq!(ObjectKind::Trunk.delete_verb(), "delete");
    }

    #[test]
    fn test_parse_show_output_takes_trailing_columns() {
        let out = "spine1-vrouter;1;192.168.1.1/30\nspine1-vrouter;2;192.168.1.5/30\n\n";
        let records = parse_show_output(out, &["l3-port", "ip"]);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].field("l3-port"), "1");
        assert_eq!(records[1].field("ip"), "192.168.1.5/30");
    }

    #[test]
    fn test_redact_password() {
        assert_eq!(redact("cli --user a:pw x", "pw"), "cli --user a:**** x");
        assert_eq!(redact("cli x", ""), "cli x");
    }
}
