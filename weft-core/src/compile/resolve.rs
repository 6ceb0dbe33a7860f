//! Phase 3: connection endpoints resolve to canonical (node, port) pairs.

use super::context::{Context, ResolvedConnection};
use super::diagnostics::{CompilePhase, Diagnostic};

const PHASE: CompilePhase = CompilePhase::Resolution;

/// Conventional source port when the endpoint names none.
pub(super) const DEFAULT_OUTPUT_PORT: &str = "out";
/// Conventional target port when the endpoint names none.
pub(super) const DEFAULT_INPUT_PORT: &str = "in";

pub(super) fn run(ctx: &mut Context<'_>) {
    let mut resolved = Vec::new();
    let mut diagnostics = Vec::new();

    for conn in &ctx.desc.connections {
        // Endpoints referencing unknown or disabled nodes were diagnosed in
        // validation; they have no compiled counterpart to resolve against.
        let (Some(source), Some(target)) = (
            ctx.node_by_name(conn.from_node()),
            ctx.node_by_name(conn.to_node()),
        ) else {
            continue;
        };

        let from_port = conn.from_port().unwrap_or(DEFAULT_OUTPUT_PORT);
        let to_port = conn.to_port().unwrap_or(DEFAULT_INPUT_PORT);

        let mut ok = true;
        if !source.has_output(from_port) {
            diagnostics.push(
                Diagnostic::error(
                    PHASE,
                    format!(
                        "node '{}' has no output port '{}'",
                        source.name, from_port
                    ),
                )
                .with_node(&source.name),
            );
            ok = false;
        }
        if !target.has_input(to_port) {
            diagnostics.push(
                Diagnostic::error(
                    PHASE,
                    format!("node '{}' has no input port '{}'", target.name, to_port),
                )
                .with_node(&target.name),
            );
            ok = false;
        }
        if !ok {
            continue;
        }

        resolved.push(ResolvedConnection {
            from_node: source.id,
            from_port: from_port.to_string(),
            to_node: target.id,
            to_port: to_port.to_string(),
            transform: conn.transform.clone(),
            skippable: conn.skippable,
        });
    }

    ctx.resolved = resolved;
    ctx.diagnostics.extend(diagnostics);
}
