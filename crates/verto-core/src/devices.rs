/// A media device as enumerated by the signaling library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaDevice {
    pub id: String,
    pub label: String,
}

impl MediaDevice {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }
}

/// Raw device enumeration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceInventory {
    pub video: Vec<MediaDevice>,
    pub audio_in: Vec<MediaDevice>,
}

/// Device choices offered to the user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceLists {
    pub video: Vec<MediaDevice>,
    pub audio: Vec<MediaDevice>,
    pub share: Vec<MediaDevice>,
    pub can_video: bool,
}

impl DeviceLists {
    /// Build the selectable lists from an enumeration.
    ///
    /// Unlabelled devices get a positional name. The whole screen is always
    /// offered as a share source. Without any camera a `none` placeholder is
    /// listed and video is disabled.
    pub fn from_inventory(inventory: &DeviceInventory) -> Self {
        let mut lists = DeviceLists {
            share: vec![MediaDevice::new("screen", "Screen")],
            ..Default::default()
        };

        for (i, device) in inventory.video.iter().enumerate() {
            if device.label.is_empty() {
                lists
                    .video
                    .push(MediaDevice::new(format!("Camera {i}"), format!("Camera {i}")));
                lists.share.push(MediaDevice::new(
                    format!("Share Device {i}"),
                    format!("Share Device {i}"),
                ));
            } else {
                lists.video.push(device.clone());
                lists.share.push(device.clone());
            }
        }

        for (i, device) in inventory.audio_in.iter().enumerate() {
            if device.label.is_empty() {
                lists.audio.push(MediaDevice::new(
                    format!("Microphone {i}"),
                    format!("Microphone {i}"),
                ));
            } else {
                lists.audio.push(device.clone());
            }
        }

        if lists.video.is_empty() {
            tracing::info!("no camera found, disabling video");
            lists.can_video = false;
            lists.video.push(MediaDevice::new("none", "No camera"));
        } else {
            lists.can_video = true;
        }

        lists
    }
}
