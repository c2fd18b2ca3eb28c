use launchpad_common::{Backend, ProcessInfo};
use sysinfo::{ProcessRefreshKind, System, UpdateKind};

/// Flatten argv the way a shell would present it for substring matching:
/// splitting on whitespace and `=` so `--port=8000` and `--port 8000` both
/// yield a `["--port", "8000"]`-shaped window.
fn flatten_argv<'a>(args: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut out = Vec::new();
    for arg in args {
        for piece in arg.splitn(2, '=') {
            out.push(piece.to_string());
        }
    }
    out
}

fn port_token_matches(flattened: &[String], port: u16) -> bool {
    let port_str = port.to_string();
    flattened.windows(2).any(|w| {
        matches!(w[0].as_str(), "--port" | "-p") && w[1] == port_str
    })
}

fn classify_backend(cmdline: &str) -> Option<Backend> {
    let lower = cmdline.to_ascii_lowercase();
    if lower.contains("vllm") {
        Some(Backend::Vllm)
    } else if lower.contains("sglang.launch_server") {
        Some(Backend::Sglang)
    } else if lower.contains("llama-server") {
        Some(Backend::LlamaCpp)
    } else if lower.contains("sdcpp-server.py") {
        Some(Backend::Sdcpp)
    } else {
        None
    }
}

fn extract_flag_value<'a>(flattened: &'a [String], names: &[&str]) -> Option<&'a str> {
    flattened
        .windows(2)
        .find(|w| names.contains(&w[0].as_str()))
        .map(|w| w[1].as_str())
}

/// Scan the host process table for a process bound to `port`, classifying it
/// by backend signature. Performs one full process-table scan per call —
/// there is no daemon thread watching for changes.
pub fn find_inference_process(port: u16) -> Option<ProcessInfo> {
    let mut system = System::new();
    system.refresh_processes_specifics(
        sysinfo::ProcessesToUpdate::All,
        ProcessRefreshKind::new().with_cmd(UpdateKind::Always).with_exe(UpdateKind::Always),
    );

    for (pid, process) in system.processes() {
        let args: Vec<&str> = process.cmd().iter().filter_map(|s| s.to_str()).collect();
        let flattened = flatten_argv(args.iter().copied());
        if !port_token_matches(&flattened, port) {
            continue;
        }
        let cmdline = args.join(" ");
        let Some(backend) = classify_backend(&cmdline) else {
            continue;
        };

        let model_path = extract_flag_value(&flattened, &["-m", "--model", "--model-path"]).map(str::to_string);
        let served_model_name =
            extract_flag_value(&flattened, &["--served-model-name", "--alias"]).map(str::to_string);

        return Some(ProcessInfo {
            pid: pid.as_u32(),
            backend,
            model_path,
            served_model_name,
            port,
            command: process.name().to_string_lossy().into_owned(),
            args: args.into_iter().map(str::to_string).collect(),
        });
    }
    None
}
