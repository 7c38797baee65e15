//! Client side of the sequencer: the editor, its Supabase backend and the
//! settings that pick a backend.

pub mod config;
pub mod editor;
pub mod supabase;

pub use config::{load_settings, open_store, Backend, Settings};
pub use editor::{EditorError, EditorEvent, PendingSave, SequenceEditor};
pub use supabase::{SupabaseConfig, SupabaseError, SupabaseStore};
