// Memory images of emulated radios
pub mod model_rom;

pub use model_rom::{hexdump, ModelRom, ModelRomError, Segment};
