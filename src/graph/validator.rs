//! Edge legality under filter capability contracts.
//!
//! Deny by default: each legal node-kind pair has an explicit rule.
//!
//! | source | target | rule |
//! |--------|--------|------|
//! | Filter | Filter | mutual sink/source listing and identical handles |
//! | Source | Filter | a track handle of the input, entering the handle of its stream type, which the target accepts |
//! | other  | other  | rejected |

use super::handle::Handle;
use super::node::{FilterInstance, GraphNode, NodePayload, SourceNode};
use crate::error::ValidationError;

pub struct GraphValidator;

impl GraphValidator {
    pub fn is_legal(
        source: &GraphNode,
        target: &GraphNode,
        source_handle: &Handle,
        target_handle: &Handle,
    ) -> bool {
        Self::check(source, target, source_handle, target_handle).is_ok()
    }

    /// Like [`is_legal`](Self::is_legal), with the reason for a rejection.
    pub fn check(
        source: &GraphNode,
        target: &GraphNode,
        source_handle: &Handle,
        target_handle: &Handle,
    ) -> Result<(), ValidationError> {
        match (&source.payload, &target.payload) {
            (NodePayload::Filter(from), NodePayload::Filter(to)) => {
                Self::check_filter_pair(from, to, source_handle, target_handle)
            }
            (NodePayload::Source(from), NodePayload::Filter(to)) => {
                Self::check_source_to_filter(from, to, source_handle, target_handle)
            }
            (NodePayload::Filter(_), NodePayload::Source(_)) => Err(
                ValidationError::Incompatible("a filter cannot feed a media input".to_string()),
            ),
            (NodePayload::Source(_), NodePayload::Source(_)) => Err(
                ValidationError::Incompatible("media inputs cannot be chained".to_string()),
            ),
        }
    }

    fn check_filter_pair(
        from: &FilterInstance,
        to: &FilterInstance,
        source_handle: &Handle,
        target_handle: &Handle,
    ) -> Result<(), ValidationError> {
        if !from.descriptor.may_send_to(to.name()) {
            return Err(ValidationError::Incompatible(format!(
                "'{}' is not a sink of '{}'",
                to.name(),
                from.name()
            )));
        }
        if !to.descriptor.may_receive_from(from.name()) {
            return Err(ValidationError::Incompatible(format!(
                "'{}' is not a source of '{}'",
                from.name(),
                to.name()
            )));
        }
        if source_handle != target_handle {
            return Err(ValidationError::Incompatible(format!(
                "handle '{}' does not match '{}'",
                source_handle, target_handle
            )));
        }
        Ok(())
    }

    fn check_source_to_filter(
        from: &SourceNode,
        to: &FilterInstance,
        source_handle: &Handle,
        target_handle: &Handle,
    ) -> Result<(), ValidationError> {
        let Handle::Track { stream_type, .. } = source_handle else {
            return Err(ValidationError::Incompatible(format!(
                "media input handle '{}' does not name a track",
                source_handle
            )));
        };
        // Tracks are unknown until inspection has run
        if !from.tracks.is_empty() && !from.handles().contains(source_handle) {
            return Err(ValidationError::Incompatible(format!(
                "media input has no track '{}'",
                source_handle
            )));
        }
        if *target_handle != Handle::Stream(stream_type.clone()) {
            return Err(ValidationError::Incompatible(format!(
                "track '{}' cannot enter handle '{}'",
                source_handle, target_handle
            )));
        }
        if !to.descriptor.capabilities.input.accepts(stream_type) {
            return Err(ValidationError::Incompatible(format!(
                "'{}' does not accept {} streams",
                to.name(),
                stream_type
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{FilterDescriptor, RawFilterDescriptor};
    use crate::graph::id::NodeId;
    use crate::types::{StreamType, Track};
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn filter_node(id: u32, raw: serde_json::Value) -> GraphNode {
        let raw: RawFilterDescriptor = serde_json::from_value(raw).unwrap();
        GraphNode {
            id: NodeId(id),
            payload: NodePayload::Filter(FilterInstance::new(Arc::new(
                FilterDescriptor::resolve(raw).unwrap(),
            ))),
        }
    }

    fn source_node(id: u32) -> GraphNode {
        GraphNode {
            id: NodeId(id),
            payload: NodePayload::Source(SourceNode::new("/root/video.mp4")),
        }
    }

    fn inspected_source(id: u32) -> GraphNode {
        let mut source = SourceNode::new("/root/video.mp4");
        source.tracks = vec![Track {
            pid: 1,
            stream_type: StreamType::Visual,
            name: "video".into(),
            attributes: BTreeMap::new(),
        }];
        GraphNode {
            id: NodeId(id),
            payload: NodePayload::Source(source),
        }
    }

    fn any_decoder(id: u32) -> GraphNode {
        filter_node(
            id,
            json!({ "name": "ffdec",
                    "capabilities": { "input": { "stream_type": ["Visual", "Audio"] } } }),
        )
    }

    fn linked_pair() -> (GraphNode, GraphNode) {
        let a = filter_node(0, json!({ "name": "a", "sinks": ["b"] }));
        let b = filter_node(1, json!({ "name": "b", "sources": ["a"] }));
        (a, b)
    }

    #[test]
    fn test_filter_pair_equal_handles() {
        let (a, b) = linked_pair();
        let visual = Handle::stream(StreamType::Visual);
        assert!(GraphValidator::is_legal(&a, &b, &visual, &visual));
    }

    #[test]
    fn test_filter_pair_unequal_handles() {
        let (a, b) = linked_pair();
        assert!(!GraphValidator::is_legal(
            &a,
            &b,
            &Handle::stream(StreamType::Visual),
            &Handle::stream(StreamType::Audio),
        ));
    }

    #[test]
    fn test_filter_pair_requires_mutual_listing() {
        let a = filter_node(0, json!({ "name": "a", "sinks": ["b"] }));
        let b = filter_node(1, json!({ "name": "b" }));
        let h = Handle::stream(StreamType::Audio);
        assert!(!GraphValidator::is_legal(&a, &b, &h, &h));
        assert!(!GraphValidator::is_legal(&b, &a, &h, &h));
    }

    #[test]
    fn test_source_to_filter_by_stream_type() {
        let src = source_node(0);
        let handle: Handle = "track1/Audio".parse().unwrap();
        let target = Handle::stream(StreamType::Audio);

        let video_only = filter_node(
            1,
            json!({ "name": "vdec", "capabilities": { "input": { "stream_type": ["Visual"] } } }),
        );
        assert!(!GraphValidator::is_legal(&src, &video_only, &handle, &target));

        let audio = filter_node(
            2,
            json!({ "name": "adec", "capabilities": { "input": { "stream_type": ["Audio"] } } }),
        );
        assert!(GraphValidator::is_legal(&src, &audio, &handle, &target));
    }

    #[test]
    fn test_other_kind_pairs_denied() {
        let (a, _) = linked_pair();
        let src = source_node(5);
        let other = source_node(6);
        let h = Handle::stream(StreamType::Visual);
        assert!(matches!(
            GraphValidator::check(&a, &src, &h, &h),
            Err(ValidationError::Incompatible(_))
        ));
        assert!(!GraphValidator::is_legal(&src, &other, &h, &h));
    }

    #[test]
    fn test_source_handle_must_name_a_track() {
        let src = source_node(0);
        let dec = any_decoder(1);
        let audio = Handle::stream(StreamType::Audio);
        assert!(matches!(
            GraphValidator::check(&src, &dec, &audio, &audio),
            Err(ValidationError::Incompatible(_))
        ));
    }

    #[test]
    fn test_track_must_enter_its_own_stream_type() {
        let src = inspected_source(0);
        let dec = any_decoder(1);
        let video: Handle = "video/Visual".parse().unwrap();
        assert!(!GraphValidator::is_legal(
            &src,
            &dec,
            &video,
            &Handle::stream(StreamType::Audio)
        ));
        assert!(GraphValidator::is_legal(
            &src,
            &dec,
            &video,
            &Handle::stream(StreamType::Visual)
        ));
    }

    #[test]
    fn test_unknown_track_rejected_after_inspection() {
        let dec = any_decoder(1);
        let ghost: Handle = "ghost/Audio".parse().unwrap();
        let audio = Handle::stream(StreamType::Audio);

        assert!(!GraphValidator::is_legal(
            &inspected_source(0),
            &dec,
            &ghost,
            &audio
        ));
        // Before inspection any track name is accepted
        assert!(GraphValidator::is_legal(&source_node(2), &dec, &ghost, &audio));
    }
}
