//! Behaviour of the scripted executor used by the probe tests.

use node_exec::executor::RemoteExecutor;
use node_exec::fakes::ScriptedExecutor;
use node_exec::powershell::{service_env_vars_query, system_env_var_query};
use node_exec::ExecError;

#[tokio::test]
async fn test_matches_by_substring() {
    let exec = ScriptedExecutor::new();
    exec.respond("'HTTP_PROXY'", "Name  : HTTP_PROXY\nValue : http://proxy:3128/\n");

    let out = exec
        .run("10.0.0.1", &system_env_var_query("HTTP_PROXY"))
        .await
        .unwrap();
    assert!(out.contains("http://proxy:3128/"));
}

#[tokio::test]
async fn test_latest_script_wins() {
    let exec = ScriptedExecutor::new();
    exec.respond("Get-Process kubelet", "old");
    exec.respond("Get-Process kubelet", "new");

    let out = exec
        .run("10.0.0.1", &service_env_vars_query("kubelet"))
        .await
        .unwrap();
    assert_eq!(out, "new");
}

#[tokio::test]
async fn test_address_scoped_responses() {
    let exec = ScriptedExecutor::new();
    exec.respond("Get-Date", "any");
    exec.respond_on("10.0.0.2", "Get-Date", "node-2");

    assert_eq!(exec.run("10.0.0.1", "Get-Date").await.unwrap(), "any");
    assert_eq!(exec.run("10.0.0.2", "Get-Date").await.unwrap(), "node-2");
}

#[tokio::test]
async fn test_failure_and_unscripted_commands() {
    let exec = ScriptedExecutor::new();
    exec.fail_on("10.0.0.1", "Get-Process", 1, "Cannot find a process");

    match exec.run("10.0.0.1", "Get-Process kubelet").await {
        Err(ExecError::CommandFailed { exit_code, stderr, .. }) => {
            assert_eq!(exit_code, 1);
            assert!(stderr.contains("Cannot find"));
        }
        other => panic!("expected CommandFailed, got {:?}", other),
    }

    assert!(exec.run("10.0.0.1", "hostname").await.is_err());
    assert_eq!(exec.issued().len(), 2);
}
