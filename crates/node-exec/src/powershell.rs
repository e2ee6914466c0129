//! PowerShell queries issued against Windows nodes.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// List a single system-level environment variable in `Format-List` form.
pub fn system_env_var_query(name: &str) -> String {
    format!(
        "Get-ChildItem -Path Env: | Where-Object -Property Name -eq '{}' | Format-List ",
        name
    )
}

/// List the environment a running service process was started with.
pub fn service_env_vars_query(service: &str) -> String {
    format!(
        "Get-Process {} | ForEach-Object {{ $_.StartInfo.EnvironmentVariables.GetEnumerator() | Format-List }}",
        service
    )
}

/// Count certificates in the machine root store equal to `cert_pem`.
///
/// Multi-line PEM data does not survive the command line, so the certificate
/// travels base64-encoded and is decoded on the node. The final output line
/// is the match count.
pub fn cert_count_query(cert_pem: &str) -> String {
    let encoded = STANDARD.encode(cert_pem.as_bytes());
    format!(
        "$base64Data=\"{encoded}\";\
         $certString=[Text.Encoding]::Utf8.GetString([Convert]::FromBase64String($base64Data));\
         Set-Content C:\\Temp\\cert.pem $certString;\
         $expectedCert=[System.Security.Cryptography.X509Certificates.X509Certificate2]::new(\"C:\\Temp\\cert.pem\");\
         (Get-ChildItem -Path Cert:\\LocalMachine\\Root | Where-Object {{$expectedCert.Equals($_)}}).Count"
    )
}

/// Job name used to label a query in logs, e.g. `get-http-proxy-env-vars`.
pub fn job_name(name: &str) -> String {
    format!("get-{}-env-vars", name.replace('_', "-").to_lowercase())
}

/// Encode a script for `powershell -EncodedCommand` (base64 of UTF-16LE).
pub fn encode_command(script: &str) -> String {
    let utf16: Vec<u8> = script
        .encode_utf16()
        .flat_map(|unit| unit.to_le_bytes())
        .collect();
    STANDARD.encode(utf16)
}

/// The last non-empty line of command output, trimmed.
pub fn final_line(output: &str) -> &str {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .last()
        .unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_env_var_query() {
        let cmd = system_env_var_query("NO_PROXY");
        assert!(cmd.contains("-eq 'NO_PROXY'"));
        assert!(cmd.contains("Format-List"));
    }

    #[test]
    fn test_service_env_vars_query() {
        let cmd = service_env_vars_query("kubelet");
        assert!(cmd.starts_with("Get-Process kubelet | ForEach-Object { "));
        assert!(cmd.ends_with("| Format-List }"));
    }

    #[test]
    fn test_cert_count_query_carries_base64() {
        let pem = "-----BEGIN CERTIFICATE-----\nAAAA\n-----END CERTIFICATE-----\n";
        let cmd = cert_count_query(pem);
        assert!(cmd.contains(&STANDARD.encode(pem)));
        assert!(!cmd.contains('\n'));
        assert!(cmd.ends_with(".Count"));
    }

    #[test]
    fn test_job_name() {
        assert_eq!(job_name("HTTP_PROXY"), "get-http-proxy-env-vars");
        assert_eq!(job_name("kubelet"), "get-kubelet-env-vars");
    }

    #[test]
    fn test_encode_command_utf16le() {
        // "A" -> 0x41 0x00
        assert_eq!(encode_command("A"), STANDARD.encode([0x41u8, 0x00]));
    }

    #[test]
    fn test_final_line() {
        assert_eq!(final_line("Loading...\r\n\r\n1\r\n\r\n"), "1");
        assert_eq!(final_line("single"), "single");
        assert_eq!(final_line("\n\n"), "");
    }
}
