use serde_json::Value;

pub fn print_recipes(recipes: &[Value]) {
    println!("\n=== Launchpad Recipes ===");
    if recipes.is_empty() {
        println!("  (no recipes)");
        return;
    }
    println!("{:<24} {:<12} {:<10} {:<8} {}", "ID", "BACKEND", "STATUS", "PORT", "MODEL");
    for r in recipes {
        println!(
            "{:<24} {:<12} {:<10} {:<8} {}",
            r.get("id").and_then(Value::as_str).unwrap_or("?"),
            r.get("backend").and_then(Value::as_str).unwrap_or("?"),
            r.get("status").and_then(Value::as_str).unwrap_or("?"),
            r.get("port").map(|p| p.to_string()).unwrap_or_default(),
            r.get("model_path").and_then(Value::as_str).unwrap_or(""),
        );
    }
    println!();
}

pub fn print_launch_result(result: &Value) {
    let success = result.get("success").and_then(Value::as_bool).unwrap_or(false);
    let message = result.get("message").and_then(Value::as_str).unwrap_or("");
    if success {
        println!("✓ {}", message);
        if let Some(pid) = result.get("pid") {
            println!("  pid: {pid}");
        }
    } else {
        println!("✗ {}", message);
        if let Some(log) = result.get("log_file").and_then(Value::as_str) {
            println!("  log: {log}");
        }
    }
}
