//! IEEE-488.2 common commands and the SCPI error queue leaf.
//!
//! Registered at the root of every dispatcher tree as ordinary leaves, so
//! they take part in collision checks and show up in `*LST?`.

use crate::command::{Command, Response};
use crate::error::{Result, ScpiError};
use crate::node::{NodeId, Tree};
use crate::status::EventStatus;

pub(crate) fn register(tree: &mut Tree) -> Result<()> {
    tree.add_command(
        NodeId::ROOT,
        Command::new("*OPC")
            .on_execute(|call| {
                let pending = call.tree().is_operation_pending(NodeId::ROOT);
                let state = call.state();
                if pending {
                    state.opc_armed = true;
                } else {
                    state.status.set(EventStatus::OPC);
                }
                Ok(Response::Empty)
            })
            .on_query(|call| {
                if !call.tree().is_operation_pending(NodeId::ROOT) {
                    return Ok(Response::from("1"));
                }
                let state = call.state();
                if state.opc_query_scheduled {
                    return Err(ScpiError::QueryInterrupted);
                }
                state.opc_query_scheduled = true;
                Ok(Response::Empty)
            }),
    )?;

    tree.add_command(
        NodeId::ROOT,
        Command::new("*WAI").on_execute(|call| {
            if call.tree().is_operation_pending(NodeId::ROOT) {
                call.state().wai_executing = true;
            }
            Ok(Response::Empty)
        }),
    )?;

    tree.add_command(
        NodeId::ROOT,
        Command::new("*ESR")
            .on_query(|call| Ok(Response::Text(call.state().status.read_and_clear().to_string()))),
    )?;

    tree.add_command(
        NodeId::ROOT,
        Command::new("*CLS").on_execute(|call| {
            call.state().clear();
            Ok(Response::Empty)
        }),
    )?;

    tree.add_command(
        NodeId::ROOT,
        Command::new("*LST").on_query(|call| Ok(Response::Text(call.tree().command_list().join("\n")))),
    )?;

    let system = tree.add_node(NodeId::ROOT, "SYSTem")?;
    tree.add_command(
        system,
        Command::new("ERRor").on_query(|call| Ok(Response::Text(call.state().errors.next_line()))),
    )?;

    Ok(())
}
