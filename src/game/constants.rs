pub const BODY_CAP: usize = 100;
pub const NAME_MAX_BYTES: usize = 24;
pub const SKIN_MAX: u8 = 38;
pub const DEFAULT_PROTOCOL_VERSION: u8 = 11;

pub const LEADERBOARD_TOP: usize = 10;
pub const MINIMAP_EDGE: usize = 80;
pub const MINIMAP_BITS: usize = MINIMAP_EDGE * MINIMAP_EDGE;

pub const ROTATION_INTERVAL_MS: u64 = 100;
pub const PING_INTERVAL_MS: u64 = 250;
pub const INPUT_SAMPLE_MS: u64 = 16;
pub const HANDSHAKE_DEADLINE_MS: u64 = 10_000;

pub const FOOD_PALETTE: [[u8; 3]; 9] = [
  [255, 0, 0],
  [0, 255, 0],
  [0, 0, 255],
  [255, 255, 0],
  [255, 0, 255],
  [0, 255, 255],
  [255, 165, 0],
  [128, 0, 128],
  [255, 255, 255],
];

pub const SNAKE_PALETTE: [[u8; 3]; 57] = [
  [255, 0, 0], [0, 255, 0], [0, 0, 255], [255, 255, 0], [255, 0, 255],
  [0, 255, 255], [255, 165, 0], [128, 0, 128], [255, 255, 255], [139, 0, 0],
  [0, 139, 0], [0, 0, 139], [139, 139, 0], [139, 0, 139], [0, 139, 139],
  [255, 69, 0], [128, 128, 0], [128, 0, 0], [0, 128, 0], [0, 0, 128],
  [128, 128, 128], [255, 215, 0], [255, 140, 0], [255, 165, 79], [255, 182, 193],
  [255, 20, 147], [255, 105, 180], [255, 69, 0], [255, 160, 122], [255, 99, 71],
  [255, 127, 80], [255, 228, 196], [255, 235, 205], [255, 245, 238], [255, 248, 220],
  [255, 250, 205], [255, 255, 224], [255, 255, 240], [240, 255, 240], [240, 255, 255],
  [245, 245, 245], [245, 255, 250], [248, 248, 255], [250, 235, 215], [250, 240, 230],
  [253, 245, 230], [255, 228, 181], [255, 228, 196], [255, 228, 225], [255, 239, 213],
  [255, 239, 219], [255, 240, 245], [255, 248, 220], [255, 250, 205], [255, 250, 240],
  [255, 255, 240], [255, 255, 255],
];
