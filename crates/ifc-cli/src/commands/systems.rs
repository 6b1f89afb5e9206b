//! Read-only lookups: the system catalog and single-project summaries.

use anyhow::Result;
use ifc_client::Transport;
use ifc_facade::Platform;

pub fn run_systems<T: Transport>(platform: &Platform<T>) -> Result<()> {
    let systems = platform.list_systems()?;
    for s in &systems {
        println!(
            "system id={} name={} display_name={}",
            s.id, s.name, s.display_name
        );
    }
    println!("systems={}", systems.len());
    Ok(())
}

pub fn run_project_info<T: Transport>(platform: &Platform<T>, name: &str) -> Result<()> {
    let p = platform.lookup_project(name)?;
    println!("project_name={}", p.name);
    println!("display_name={}", p.display_name.as_deref().unwrap_or(""));
    println!("c_value={}", opt(p.c_value));
    println!("p_value={}", opt(p.p_value));
    Ok(())
}

fn opt<V: std::fmt::Display>(v: Option<V>) -> String {
    v.map(|x| x.to_string()).unwrap_or_else(|| "NULL".to_string())
}
