//! Hand-rolled HLS media playlist rendering.
//!
//! Built directly rather than through an external muxing crate: the
//! playlists Sectify emits are narrow (VOD, one key, one variant) and the
//! exact text layout matters for player compatibility, so it is rendered
//! by hand the way the rest of this workspace renders its own wire formats.

use crate::packager::PackagedSegment;

/// One renderable HLS media playlist: a run of segments sharing a single
/// AES-128 key, addressed through a key-alias URI rather than the raw key.
pub struct MediaPlaylist<'a> {
    pub segments: &'a [PackagedSegment],
    pub key_uri: String,
    pub segment_uri_prefix: String,
}

impl<'a> MediaPlaylist<'a> {
    pub fn new(segments: &'a [PackagedSegment], key_uri: String, segment_uri_prefix: String) -> Self {
        Self {
            segments,
            key_uri,
            segment_uri_prefix,
        }
    }

    fn target_duration(&self) -> u64 {
        self.segments
            .iter()
            .map(|s| s.duration_secs.ceil() as u64)
            .max()
            .unwrap_or(1)
    }

    /// Renders the playlist body. Exactly one `#EXT-X-KEY` line is emitted,
    /// shared by every segment; it carries no explicit `IV` attribute, so
    /// players fall back to the HLS-default IV (the segment's media
    /// sequence number, big-endian, zero-extended to 128 bits) which is
    /// exactly the IV derivation used when packaging.
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str("#EXTM3U\n");
        out.push_str("#EXT-X-VERSION:3\n");
        out.push_str(&format!("#EXT-X-TARGETDURATION:{}\n", self.target_duration()));
        out.push_str("#EXT-X-MEDIA-SEQUENCE:0\n");
        out.push_str("#EXT-X-PLAYLIST-TYPE:VOD\n");
        out.push_str(&format!(
            "#EXT-X-KEY:METHOD=AES-128,URI=\"{}\"\n",
            self.key_uri
        ));

        for segment in self.segments {
            out.push_str(&format!("#EXTINF:{:.3},\n", segment.duration_secs));
            out.push_str(&format!(
                "{}/segment_{}.ts\n",
                self.segment_uri_prefix, segment.index
            ));
        }
        out.push_str("#EXT-X-ENDLIST\n");
        out
    }
}
