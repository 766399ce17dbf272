//! End-to-end compiler tests for scenarios that need more than one module's
//! unit tests to exercise: a multi-stage transfer pipeline (S4), recompiling
//! an unchanged graph (S5), and reusing one compiled executable's plan data
//! across independently-bound surfaces (S6).

use vulkanalia::vk;

use vkrg::graph::barrier::Subpass;
use vkrg::graph::{
    AttachmentRole, ImageSubresourceRange, LoadOp, OperationKind, QueueAssignmentPolicy,
    QueueTraits, RenderGraph, ResourceDefinition, Size,
};

fn face_color_def() -> ResourceDefinition {
    ResourceDefinition::image(
        vk::Format::R16G16B16A16_SFLOAT,
        AttachmentRole::Color,
        Size::Absolute { width: 128, height: 128 },
        vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_SRC,
    )
}

fn env_cube_def() -> ResourceDefinition {
    ResourceDefinition::image(
        vk::Format::R16G16B16A16_SFLOAT,
        AttachmentRole::Color,
        Size::Absolute { width: 128, height: 128 },
        vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::SAMPLED,
    )
}

fn irradiance_face_def() -> ResourceDefinition {
    ResourceDefinition::image(
        vk::Format::R16G16B16A16_SFLOAT,
        AttachmentRole::Color,
        Size::Absolute { width: 32, height: 32 },
        vk::ImageUsageFlags::COLOR_ATTACHMENT,
    )
}

/// Builds the six-face-render -> blit -> six-irradiance-sample graph from
/// spec.md's IBL scenario: six independent face renders feed one transfer
/// operation, which feeds six independent irradiance passes.
fn build_ibl_graph() -> RenderGraph {
    let mut graph = RenderGraph::new();
    graph.add_resource_type("face_color", face_color_def()).unwrap();
    graph.add_resource_type("env_cube", env_cube_def()).unwrap();
    graph.add_resource_type("irradiance_face", irradiance_face_def()).unwrap();

    for n in 0..6 {
        let face = format!("face{n}");
        graph
            .add_operation(&face, OperationKind::Graphics, Some((128, 128)), 0)
            .unwrap();
        graph
            .add_attachment_output(
                &face,
                "face_color",
                &format!("{face}_out"),
                vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
                LoadOp::ClearColor([0.0; 4]),
                ImageSubresourceRange::default(),
            )
            .unwrap();
    }

    graph.add_operation("blit", OperationKind::Transfer, None, 0).unwrap();
    for n in 0..6 {
        let face = format!("face{n}");
        graph
            .add_image_input(
                "blit",
                "face_color",
                &format!("{face}_out"),
                vk::PipelineStageFlags::TRANSFER,
                vk::AccessFlags::TRANSFER_READ,
                ImageSubresourceRange::default(),
            )
            .unwrap();
    }
    graph
        .add_image_output(
            "blit",
            "env_cube",
            "env_cube_out",
            vk::PipelineStageFlags::TRANSFER,
            vk::AccessFlags::TRANSFER_WRITE,
            ImageSubresourceRange::default(),
        )
        .unwrap();

    for n in 0..6 {
        let irr = format!("irradiance{n}");
        graph
            .add_operation(&irr, OperationKind::Graphics, Some((32, 32)), 0)
            .unwrap();
        graph
            .add_image_input(
                &irr,
                "env_cube",
                "env_cube_out",
                vk::PipelineStageFlags::FRAGMENT_SHADER,
                vk::AccessFlags::SHADER_READ,
                ImageSubresourceRange::default(),
            )
            .unwrap();
        graph
            .add_attachment_output(
                &irr,
                "irradiance_face",
                &format!("{irr}_out"),
                vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
                LoadOp::ClearColor([0.0; 4]),
                ImageSubresourceRange::default(),
            )
            .unwrap();
    }

    graph.set_queue_traits(vec![QueueTraits {
        name: "universal".to_string(),
        capabilities: vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER,
        queue_family_index: 0,
        policy: QueueAssignmentPolicy::Shared,
    }]);

    graph
}

/// S4 from spec.md: six face renders feed a blit that feeds six irradiance
/// passes. Ordering must place every face before the blit and the blit before
/// every irradiance pass. The blit is bare (transfer never joins a render
/// pass), so every edge that crosses into or out of it is absorbed as an
/// External subpass dependency on the render-pass side rather than emitted as
/// a standalone pipeline barrier -- component F per spec §4.F. The six
/// same-sized face renders collapse into one multi-subpass pass, as do the
/// six same-sized irradiance renders, leaving exactly two passes either side
/// of the bare blit.
#[test]
fn s4_ibl_mip_chain_orders_and_barriers_the_transfer_edges() {
    let mut graph = build_ibl_graph();
    let exe = graph.compile().unwrap();

    let pos = |name: &str| exe.order.iter().position(|o| o == name).unwrap();
    let blit_pos = pos("blit");
    for n in 0..6 {
        assert!(pos(&format!("face{n}")) < blit_pos, "face{n} must precede blit");
        assert!(blit_pos < pos(&format!("irradiance{n}")), "blit must precede irradiance{n}");
    }
    assert_eq!(exe.passes().count(), 2, "faces and irradiance each collapse into one multi-subpass pass");

    let all_deps: Vec<_> = exe.barriers.subpass_dependencies.values().flatten().collect();

    let into_blit: Vec<_> = all_deps
        .iter()
        .filter(|d| d.dst_subpass == Subpass::External)
        .collect();
    assert_eq!(into_blit.len(), 6, "one External-out dependency per face render");
    for d in &into_blit {
        assert_eq!(d.src_access, vk::AccessFlags::COLOR_ATTACHMENT_WRITE);
        assert_eq!(d.dst_access, vk::AccessFlags::SHADER_READ);
    }

    let out_of_blit: Vec<_> = all_deps
        .iter()
        .filter(|d| d.src_subpass == Subpass::External)
        .collect();
    assert_eq!(out_of_blit.len(), 6, "one External-in dependency per irradiance render");
    for d in &out_of_blit {
        assert_eq!(d.src_access, vk::AccessFlags::SHADER_WRITE);
        assert_eq!(d.dst_access, vk::AccessFlags::SHADER_READ);
    }

    assert!(exe.barriers.image_barriers.is_empty(), "blit touches no operation that is itself bare on both sides");
}

/// S5 from spec.md: a swapchain resize does not itself change the graph
/// definition, only the surface-relative sizes it resolves against at bind
/// time. Recompiling an unchanged graph must yield an executable with the
/// same order, schedule and barrier counts -- `compile` is a pure function of
/// the graph definition.
#[test]
fn s5_recompiling_an_unchanged_graph_is_idempotent() {
    let mut graph = build_ibl_graph();
    let first = graph.compile().unwrap();
    assert!(graph.is_compiled());

    // A resize does not mutate the graph definition; recompiling it (as the
    // executor does after rebuilding a swapchain) must reproduce the exact
    // same plan.
    let second = graph.compile().unwrap();

    assert_eq!(first.order, second.order);
    assert_eq!(first.schedule.global_order, second.schedule.global_order);
    assert_eq!(first.passes().count(), second.passes().count());
    assert_eq!(first.barriers.image_barriers.len(), second.barriers.image_barriers.len());
    assert_eq!(first.barriers.buffer_barriers.len(), second.barriers.buffer_barriers.len());
    for (a, b) in first.units.iter().zip(second.units.iter()) {
        assert_eq!(format!("{a:?}"), format!("{b:?}"), "scheduled units must match exactly");
    }
}

/// S6 from spec.md: one compiled executable is shared across N surfaces, each
/// owning its own framebuffer set. The executable itself carries no
/// per-surface state, so its schedule/barrier/pass-plan data can be read
/// repeatedly and independently -- e.g. once per surface's bind step --
/// without compiling again or observing any change between reads.
#[test]
fn s6_one_executable_serves_multiple_independent_surface_reads() {
    let mut graph = build_ibl_graph();
    let exe = graph.compile().unwrap();

    // Simulate three surfaces each binding framebuffers against the same
    // compiled plan: each "bind" only reads `exe.passes()`/`exe.barriers`, and
    // every read must observe identical data.
    let reads: Vec<Vec<String>> = (0..3)
        .map(|_| exe.passes().map(|p| format!("{p:?}")).collect())
        .collect();
    assert!(reads.iter().all(|r| *r == reads[0]));

    let dependency_counts: Vec<usize> = (0..3)
        .map(|_| exe.barriers.subpass_dependencies.values().map(Vec::len).sum())
        .collect();
    assert!(dependency_counts.iter().all(|&c| c == dependency_counts[0]));
    assert!(dependency_counts[0] > 0);

    // Canonical transitions resolved for a given (operation, entry) are a
    // property of the compiled plan, not of which surface is asking.
    let canon_first = exe.canonical_transition("face0", "face0_out");
    let canon_second = exe.canonical_transition("face0", "face0_out");
    assert_eq!(canon_first, canon_second);
    assert!(canon_first.is_some());
}
