use std::io::Read;
use std::net::{Ipv4Addr, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use crate::error::{Result, ZtpError};

/// Keyboard-interactive prompt handler that always responds with the password
struct PasswordPrompt {
    password: String,
}

impl ssh2::KeyboardInteractivePrompt for PasswordPrompt {
    fn prompt<'a>(
        &mut self,
        _username: &str,
        _instructions: &str,
        prompts: &[ssh2::Prompt<'a>],
    ) -> Vec<String> {
        prompts.iter().map(|_| self.password.clone()).collect()
    }
}

/// Parse a dotted-decimal IPv4 address (e.g., "192.168.1.1")
pub fn parse_ipv4(ip: &str) -> Result<Ipv4Addr> {
    ip.trim()
        .parse()
        .map_err(|_| ZtpError::InvalidAddress(format!("'{}' is not an IPv4 address", ip)))
}

/// Parse "a.b.c.d/len" into address and prefix length.
/// A bare address is treated as a host route (/32).
pub fn parse_cidr(cidr: &str) -> Result<(Ipv4Addr, u8)> {
    match cidr.trim().split_once('/') {
        Some((addr, len)) => {
            let len: u8 = len
                .parse()
                .ok()
                .filter(|l| *l <= 32)
                .ok_or_else(|| ZtpError::InvalidAddress(format!("bad prefix length in '{}'", cidr)))?;
            Ok((parse_ipv4(addr)?, len))
        }
        None => Ok((parse_ipv4(cidr)?, 32)),
    }
}

/// Network mask for a prefix length, e.g. 24 -> 0xffffff00
pub fn prefix_mask(prefix_len: u8) -> u32 {
    match prefix_len {
        0 => 0,
        len if len >= 32 => u32::MAX,
        len => u32::MAX << (32 - u32::from(len)),
    }
}

/// Validate a switch name before it is placed on a CLI command line.
/// Allows alphanumeric, hyphens, dots, and underscores. No path separators or shell metacharacters.
pub fn is_valid_hostname(hostname: &str) -> bool {
    if hostname.is_empty() || hostname.len() > 253 {
        return false;
    }
    hostname.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.' || c == '_')
}

/// Port 22 on `host`, which may be an IP literal or a DNS name
pub fn ssh_address(host: &str) -> Result<SocketAddr, String> {
    (host, 22)
        .to_socket_addrs()
        .map_err(|e| format!("Invalid address {}: {}", host, e))?
        .next()
        .ok_or_else(|| format!("Invalid address {}: no addresses resolved", host))
}

/// Create an SSH session and authenticate with password + keyboard-interactive.
/// Returns the authenticated Session. Uses the ssh2 crate (libssh2).
/// This is blocking, so call from a spawn_blocking context.
pub fn ssh_connect(host: &str, user: &str, pass: &str, timeout_secs: u64) -> Result<ssh2::Session, String> {
    let addr = ssh_address(host)?;
    let tcp = TcpStream::connect_timeout(&addr, Duration::from_secs(timeout_secs))
        .map_err(|e| format!("TCP connection failed: {}", e))?;

    tcp.set_read_timeout(Some(Duration::from_secs(timeout_secs)))
        .ok();
    tcp.set_write_timeout(Some(Duration::from_secs(timeout_secs)))
        .ok();

    let mut session = ssh2::Session::new()
        .map_err(|e| format!("Failed to create SSH session: {}", e))?;
    session.set_tcp_stream(tcp);
    session.set_timeout(timeout_secs as u32 * 1000);
    session.handshake()
        .map_err(|e| format!("SSH handshake failed: {}", e))?;

    match session.userauth_password(user, pass) {
        Ok(_) if session.authenticated() => return Ok(session),
        _ => {}
    }

    // Netvisor and similar NOSes only offer keyboard-interactive
    let mut prompter = PasswordPrompt { password: pass.to_string() };
    let _ = session.userauth_keyboard_interactive(user, &mut prompter);

    if session.authenticated() {
        Ok(session)
    } else {
        Err("SSH authentication failed: all methods exhausted".to_string())
    }
}

/// Output and exit status of one remote command
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_status: i32,
}

/// Connect via SSH and run a single command, returning its output and exit status.
/// This is blocking, so call from a spawn_blocking context.
pub fn ssh_run_command(
    host: &str,
    user: &str,
    pass: &str,
    command: &str,
    timeout_secs: u64,
) -> Result<CommandOutput, String> {
    let session = ssh_connect(host, user, pass, timeout_secs)?;

    let mut channel = session.channel_session()
        .map_err(|e| format!("Failed to open channel: {}", e))?;

    channel.exec(command)
        .map_err(|e| format!("Failed to execute command: {}", e))?;

    let mut stdout = String::new();
    channel.read_to_string(&mut stdout)
        .map_err(|e| format!("Failed to read output: {}", e))?;
    let mut stderr = String::new();
    channel.stderr().read_to_string(&mut stderr).ok();

    channel.wait_close()
        .map_err(|e| format!("Failed to close channel: {}", e))?;
    let exit_status = channel.exit_status()
        .map_err(|e| format!("Failed to read exit status: {}", e))?;

    Ok(CommandOutput { stdout, stderr, exit_status })
}

/// Async wrapper for ssh_run_command - runs in a blocking thread pool
pub async fn ssh_run_command_async(
    host: &str,
    user: &str,
    pass: &str,
    command: &str,
    timeout_secs: u64,
) -> Result<CommandOutput, String> {
    let host = host.to_string();
    let user = user.to_string();
    let pass = pass.to_string();
    let command = command.to_string();

    tokio::task::spawn_blocking(move || {
        ssh_run_command(&host, &user, &pass, &command, timeout_secs)
    })
    .await
    .map_err(|e| format!("Task join error: {}", e))?
}
