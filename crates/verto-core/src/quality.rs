use crate::signaling::VideoParams;

/// Minimum frame rate requested from the camera.
const MIN_FRAME_RATE: u32 = 15;
/// Preferred frame rate requested from the camera.
const BEST_FRAME_RATE: u32 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoQuality {
    pub id: &'static str,
    pub label: &'static str,
    pub width: u32,
    pub height: u32,
}

pub const VIDEO_QUALITIES: [VideoQuality; 6] = [
    VideoQuality { id: "qvga", label: "QVGA 320x240", width: 320, height: 240 },
    VideoQuality { id: "vga", label: "VGA 640x480", width: 640, height: 480 },
    VideoQuality { id: "qvga_wide", label: "QVGA WIDE 320x180", width: 320, height: 180 },
    VideoQuality { id: "vga_wide", label: "VGA WIDE 640x360", width: 640, height: 360 },
    VideoQuality { id: "hd", label: "HD 1280x720", width: 1280, height: 720 },
    VideoQuality { id: "hhd", label: "HHD 1920x1080", width: 1920, height: 1080 },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BandwidthOption {
    pub id: &'static str,
    pub label: &'static str,
}

pub const BANDWIDTH_OPTIONS: [BandwidthOption; 8] = [
    BandwidthOption { id: "250", label: "250kb" },
    BandwidthOption { id: "500", label: "500kb" },
    BandwidthOption { id: "1024", label: "1mb" },
    BandwidthOption { id: "1536", label: "1.5mb" },
    BandwidthOption { id: "2048", label: "2mb" },
    BandwidthOption { id: "5120", label: "5mb" },
    BandwidthOption { id: "0", label: "No Limit" },
    BandwidthOption { id: "default", label: "Server Default" },
];

/// Result of the camera resolution probe run by the signaling library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionCheck {
    pub best: (u32, u32),
    pub valid: Vec<(u32, u32)>,
}

/// Qualities from the table the camera supports, in table order.
pub fn supported_qualities(valid: &[(u32, u32)]) -> Vec<VideoQuality> {
    VIDEO_QUALITIES
        .iter()
        .filter(|q| valid.contains(&(q.width, q.height)))
        .copied()
        .collect()
}

/// Resolution actually requested for a probed best resolution.
///
/// 1080p is capped to 720p.
pub fn capped_resolution(best: (u32, u32)) -> (u32, u32) {
    if best.1 == 1080 { (1280, 720) } else { best }
}

pub fn video_params(width: u32, height: u32) -> VideoParams {
    VideoParams {
        min_width: width,
        min_height: height,
        max_width: width,
        max_height: height,
        min_frame_rate: MIN_FRAME_RATE,
        best_frame_rate: BEST_FRAME_RATE,
    }
}

pub fn quality_for(width: u32, height: u32) -> Option<VideoQuality> {
    VIDEO_QUALITIES
        .iter()
        .find(|q| q.width == width && q.height == height)
        .copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters_unsupported_qualities() {
        let supported = supported_qualities(&[(640, 480), (1280, 720), (800, 600)]);
        let ids: Vec<_> = supported.iter().map(|q| q.id).collect();
        assert_eq!(ids, vec!["vga", "hd"]);
    }

    #[test]
    fn caps_full_hd() {
        assert_eq!(capped_resolution((1920, 1080)), (1280, 720));
        assert_eq!(capped_resolution((640, 480)), (640, 480));
    }

    #[test]
    fn video_params_pin_resolution() {
        let p = video_params(640, 360);
        assert_eq!((p.min_width, p.max_width), (640, 640));
        assert_eq!((p.min_height, p.max_height), (360, 360));
        assert_eq!(p.min_frame_rate, 15);
        assert_eq!(p.best_frame_rate, 30);
    }

    #[test]
    fn lookup_quality_by_resolution() {
        assert_eq!(quality_for(1280, 720).map(|q| q.id), Some("hd"));
        assert!(quality_for(1, 1).is_none());
    }
}
