//! The fixed encoding ladder shared by both providers. Keeping one ladder is
//! what makes provider choice invisible to playback: the same renditions come
//! out whichever encoder produced them.

/// HLS segment duration in seconds.
pub const SEGMENT_SECONDS: u32 = 6;

/// Assumed keyframe rate used to pin the GOP to the segment duration, so
/// segment boundaries always fall on keyframes.
pub const KEYFRAME_RATE: u32 = 30;

pub const GOP_FRAMES: u32 = SEGMENT_SECONDS * KEYFRAME_RATE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LadderRung {
    pub name: &'static str,
    pub width: u32,
    pub height: u32,
    pub video_bitrate_kbps: u32,
    pub audio_bitrate_kbps: u32,
}

impl LadderRung {
    pub fn resolution(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }

    /// Approximate stream bandwidth advertised in the master playlist:
    /// video + audio bitrate, in bits per second.
    pub fn bandwidth_bits(&self) -> u64 {
        u64::from(self.video_bitrate_kbps + self.audio_bitrate_kbps) * 1000
    }

    pub fn playlist_name(&self) -> String {
        format!("{}.m3u8", self.name)
    }

    pub fn segment_pattern(&self) -> String {
        format!("{}_%03d.ts", self.name)
    }
}

pub const LADDER: [LadderRung; 3] = [
    LadderRung {
        name: "480p",
        width: 842,
        height: 480,
        video_bitrate_kbps: 1400,
        audio_bitrate_kbps: 128,
    },
    LadderRung {
        name: "720p",
        width: 1280,
        height: 720,
        video_bitrate_kbps: 2800,
        audio_bitrate_kbps: 128,
    },
    LadderRung {
        name: "1080p",
        width: 1920,
        height: 1080,
        video_bitrate_kbps: 5000,
        audio_bitrate_kbps: 192,
    },
];

/// Render the variant (master) playlist referencing each rung's sub-playlist.
pub fn master_playlist(rungs: &[LadderRung]) -> String {
    let mut out = String::from("#EXTM3U\n#EXT-X-VERSION:3\n");
    for rung in rungs {
        out.push_str(&format!(
            "#EXT-X-STREAM-INF:BANDWIDTH={},RESOLUTION={}\n{}\n",
            rung.bandwidth_bits(),
            rung.resolution(),
            rung.playlist_name()
        ));
    }
    out
}
