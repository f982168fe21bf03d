//! P1: normalize resource descs and propagate per-view access inference.

use crate::cmd::{CommandDecl, FrameInput};
use crate::error::{RgError, RgResult};
use crate::format::RgFormat;
use crate::render_graph::RenderGraph;
use crate::resource::ResourceFlags;
use crate::transition::CmdAccessInfo;

pub fn run(rg: &mut RenderGraph, input: &FrameInput) -> RgResult<()> {
    for decl in &input.commands {
        let accesses = match decl {
            CommandDecl::Node { accesses, .. } => accesses,
            _ => continue,
        };

        let mut infos = Vec::with_capacity(accesses.len());
        for acc in accesses {
            if acc.resource_id as usize >= rg.resources.len() {
                return Err(RgError::IndexOutOfBounds {
                    what: "CmdAccessDecl::resource_id",
                    index: acc.resource_id,
                    bound: rg.resources.len() as u32,
                });
            }

            let resource = &mut rg.resources[acc.resource_id];
            let mutable_format = resource.desc.flags.contains(ResourceFlags::MUTABLE_FORMAT);
            let view_format_specified = acc.view_format != RgFormat::Unknown;
            if view_format_specified {
                let compatible = if mutable_format {
                    resource.desc.format.is_format_compatible(acc.view_format)
                } else {
                    acc.view_format == resource.desc.format
                };
                if !compatible {
                    return Err(RgError::InconsistentViewFormat {
                        resource_id: acc.resource_id,
                    });
                }
            }

            resource.all_accesses |= acc.access.access_flags;

            infos.push(CmdAccessInfo {
                resource_id: acc.resource_id,
                range: acc.range,
                view_format: acc.view_format,
                access: acc.access,
                view_info_id: None,
            });
        }
        rg.cmd_accesses.push(infos);
    }
    log::trace!("P1 PreProcess: {} command access lists", rg.cmd_accesses.len());
    Ok(())
}
