//! Channel discovery: enumerate device channels and bind well-known names to indices.

use crate::mesh::session::{MeshError, MeshSession};

/// A mesh channel as discovered on the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    pub index: u8,
    pub name: String,
}

/// Indices of the three well-known channels. Until discovery binds them by name
/// they hold the conventional placeholder slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WellKnown {
    pub public: u8,
    pub test: u8,
    pub bot: u8,
}

impl Default for WellKnown {
    fn default() -> Self {
        Self {
            public: 0,
            test: 1,
            bot: 2,
        }
    }
}

/// Names the well-known channels are matched against during discovery.
#[derive(Debug, Clone)]
pub struct WellKnownNames {
    pub public: String,
    pub test: String,
    pub bot: String,
}

/// Index→name table for one connection epoch. Rebuilt from scratch after every
/// reconnect; read-only afterwards.
pub struct ChannelRegistry {
    channels: Vec<Channel>,
    well_known: WellKnown,
}

impl ChannelRegistry {
    /// Enumerate channels starting at index 0 until the device reports no channel.
    /// Channels with empty names are skipped in the table but still counted for
    /// well-known matching; a well-known name that never appears keeps its
    /// placeholder index.
    pub async fn discover(
        session: &mut dyn MeshSession,
        names: &WellKnownNames,
        placeholders: WellKnown,
    ) -> Result<Self, MeshError> {
        let mut channels = Vec::new();
        let mut well_known = placeholders;
        let mut idx: u8 = 0;
        loop {
            let info = match session.get_channel(idx).await? {
                Some(info) => info,
                None => break,
            };
            if info.channel_name == names.public {
                well_known.public = info.channel_idx;
            } else if info.channel_name == names.test {
                well_known.test = info.channel_idx;
            } else if info.channel_name == names.bot {
                well_known.bot = info.channel_idx;
            }
            if !info.channel_name.is_empty() {
                channels.push(Channel {
                    index: info.channel_idx,
                    name: info.channel_name,
                });
            }
            idx = match idx.checked_add(1) {
                Some(next) => next,
                None => break,
            };
        }
        log::info!("discovered {} mesh channels", channels.len());
        Ok(Self {
            channels,
            well_known,
        })
    }

    pub fn name_of(&self, index: u8) -> Option<&str> {
        self.channels
            .iter()
            .find(|c| c.index == index)
            .map(|c| c.name.as_str())
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn well_known(&self) -> WellKnown {
        self.well_known
    }
}
