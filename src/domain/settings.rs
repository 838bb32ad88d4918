use std::collections::HashMap;
use std::fmt;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// A keyboard shortcut bound to an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortcutBinding {
    pub id: String,
    pub name: String,
    pub description: String,
    pub default_binding: String,
    pub current_binding: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlayPosition {
    None,
    Top,
    Bottom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SoundTheme {
    Marimba,
    Pop,
    Custom,
}

/// How long the microphone stream stays open after recording stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MicrophoneKeepAlive {
    Off,
    Sec5,
    Sec15,
    Sec30,
    Min1,
    Min5,
    Min15,
    Hour1,
    Forever,
}

/// How long a loaded model stays in memory after the last transcription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelUnloadTimeout {
    Never,
    Immediately,
    Min2,
    Min5,
    Min10,
    Min15,
    Hour1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PasteMethod {
    CtrlV,
    Direct,
    ShiftInsert,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClipboardHandling {
    DontModify,
    CopyToClipboard,
}

/// Full settings snapshot as reported by the backend.
///
/// Missing fields fall back to their defaults so partial payloads from older
/// backends still deserialize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsSnapshot {
    pub bindings: HashMap<String, ShortcutBinding>,
    pub push_to_talk: bool,
    pub audio_feedback: bool,
    pub audio_feedback_volume: f32,
    pub sound_theme: SoundTheme,
    pub start_hidden: bool,
    pub autostart_enabled: bool,
    pub update_checks_enabled: bool,
    pub selected_model: String,
    pub always_on_microphone: bool,
    pub microphone_keep_alive: MicrophoneKeepAlive,
    pub selected_microphone: Option<String>,
    pub selected_output_device: Option<String>,
    pub translate_to_english: bool,
    pub selected_language: String,
    pub overlay_position: OverlayPosition,
    pub debug_mode: bool,
    pub custom_words: Vec<String>,
    pub model_unload_timeout: ModelUnloadTimeout,
    pub word_correction_threshold: f64,
    pub paste_method: PasteMethod,
    pub clipboard_handling: ClipboardHandling,
    pub mute_while_recording: bool,
    pub append_trailing_space: bool,
    pub app_language: String,
}

fn default_shortcut() -> &'static str {
    #[cfg(target_os = "macos")]
    {
        "option+space"
    }

    #[cfg(any(target_os = "windows", target_os = "linux"))]
    {
        "ctrl+space"
    }

    #[cfg(not(any(target_os = "macos", target_os = "windows", target_os = "linux")))]
    {
        "alt+space"
    }
}

impl Default for SettingsSnapshot {
    fn default() -> Self {
        let mut bindings = HashMap::new();
        bindings.insert(
            "transcribe".to_string(),
            ShortcutBinding {
                id: "transcribe".to_string(),
                name: "Transcribe".to_string(),
                description: "Converts your speech into text.".to_string(),
                default_binding: default_shortcut().to_string(),
                current_binding: default_shortcut().to_string(),
            },
        );

        Self {
            bindings,
            push_to_talk: true,
            audio_feedback: true,
            audio_feedback_volume: 1.0,
            sound_theme: SoundTheme::Marimba,
            start_hidden: false,
            autostart_enabled: false,
            update_checks_enabled: true,
            selected_model: String::new(),
            always_on_microphone: false,
            microphone_keep_alive: MicrophoneKeepAlive::Off,
            selected_microphone: None,
            selected_output_device: None,
            translate_to_english: false,
            selected_language: "auto".to_string(),
            overlay_position: OverlayPosition::Bottom,
            debug_mode: false,
            custom_words: Vec::new(),
            model_unload_timeout: ModelUnloadTimeout::Never,
            word_correction_threshold: 0.18,
            paste_method: PasteMethod::CtrlV,
            clipboard_handling: ClipboardHandling::DontModify,
            mute_while_recording: false,
            append_trailing_space: false,
            app_language: "en".to_string(),
        }
    }
}

impl SettingsSnapshot {
    pub fn binding(&self, id: &str) -> Option<&ShortcutBinding> {
        self.bindings.get(id)
    }

    /// Set the current binding of `id`. Returns false if the binding does not exist.
    pub fn set_binding(&mut self, id: &str, binding: &str) -> bool {
        match self.bindings.get_mut(id) {
            Some(entry) => {
                entry.current_binding = binding.to_string();
                true
            }
            None => false,
        }
    }

    /// Copy of this snapshot with `setting` applied.
    pub fn with(&self, setting: Setting) -> Self {
        let mut next = self.clone();
        next.set(setting);
        next
    }
}

/// Registered defaults used by `reset_setting`.
static DEFAULTS: Lazy<SettingsSnapshot> = Lazy::new(SettingsSnapshot::default);

// One row per setting: variant, snapshot field, value type, backend command, parameter name.
// Adding a field without a command does not compile.
macro_rules! settings_table {
    ($( $variant:ident => $field:ident : $ty:ty, $command:literal, $param:literal; )+) => {
        /// Key of a single setting in the snapshot.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum SettingKey {
            $($variant,)+
        }

        impl SettingKey {
            pub const ALL: &'static [SettingKey] = &[$(SettingKey::$variant,)+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(SettingKey::$variant => stringify!($field),)+
                }
            }

            /// Backend command that applies this setting.
            pub fn command(&self) -> &'static str {
                match self {
                    $(SettingKey::$variant => $command,)+
                }
            }

            fn param_name(&self) -> &'static str {
                match self {
                    $(SettingKey::$variant => $param,)+
                }
            }
        }

        /// A setting together with its typed value.
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        #[serde(tag = "key", content = "value", rename_all = "snake_case")]
        pub enum Setting {
            $($variant($ty),)+
        }

        impl Setting {
            pub fn key(&self) -> SettingKey {
                match self {
                    $(Setting::$variant(_) => SettingKey::$variant,)+
                }
            }

            fn value_json(&self) -> Value {
                match self {
                    $(Setting::$variant(value) => json!(value),)+
                }
            }
        }

        impl SettingsSnapshot {
            pub fn get(&self, key: SettingKey) -> Setting {
                match key {
                    $(SettingKey::$variant => Setting::$variant(self.$field.clone()),)+
                }
            }

            pub fn set(&mut self, setting: Setting) {
                match setting {
                    $(Setting::$variant(value) => self.$field = value,)+
                }
            }
        }
    };
}

settings_table! {
    PushToTalk => push_to_talk: bool, "change_ptt_setting", "enabled";
    AudioFeedback => audio_feedback: bool, "change_audio_feedback_setting", "enabled";
    AudioFeedbackVolume => audio_feedback_volume: f32, "change_audio_feedback_volume_setting", "volume";
    SoundTheme => sound_theme: SoundTheme, "change_sound_theme_setting", "theme";
    StartHidden => start_hidden: bool, "change_start_hidden_setting", "enabled";
    AutostartEnabled => autostart_enabled: bool, "change_autostart_setting", "enabled";
    UpdateChecksEnabled => update_checks_enabled: bool, "change_update_checks_setting", "enabled";
    SelectedModel => selected_model: String, "set_active_model", "modelId";
    AlwaysOnMicrophone => always_on_microphone: bool, "update_microphone_mode", "alwaysOn";
    MicrophoneKeepAlive => microphone_keep_alive: MicrophoneKeepAlive, "set_microphone_keep_alive", "keepAlive";
    SelectedMicrophone => selected_microphone: Option<String>, "set_selected_microphone", "deviceName";
    SelectedOutputDevice => selected_output_device: Option<String>, "set_selected_output_device", "deviceName";
    TranslateToEnglish => translate_to_english: bool, "change_translate_to_english_setting", "enabled";
    SelectedLanguage => selected_language: String, "change_selected_language_setting", "language";
    OverlayPosition => overlay_position: OverlayPosition, "change_overlay_position_setting", "position";
    DebugMode => debug_mode: bool, "change_debug_mode_setting", "enabled";
    CustomWords => custom_words: Vec<String>, "update_custom_words", "words";
    ModelUnloadTimeout => model_unload_timeout: ModelUnloadTimeout, "set_model_unload_timeout", "timeout";
    WordCorrectionThreshold => word_correction_threshold: f64, "change_word_correction_threshold_setting", "threshold";
    PasteMethod => paste_method: PasteMethod, "change_paste_method_setting", "method";
    ClipboardHandling => clipboard_handling: ClipboardHandling, "change_clipboard_handling_setting", "handling";
    MuteWhileRecording => mute_while_recording: bool, "change_mute_while_recording_setting", "enabled";
    AppendTrailingSpace => append_trailing_space: bool, "change_append_trailing_space_setting", "enabled";
    AppLanguage => app_language: String, "change_app_language_setting", "language";
}

impl SettingKey {
    /// Look up a key by its snake_case name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|key| key.as_str() == name)
    }

    /// Registered default for this key, if any.
    ///
    /// The selected model has none: it is chosen from the model catalog.
    pub fn default_setting(&self) -> Option<Setting> {
        match self {
            SettingKey::SelectedModel => None,
            key => Some(DEFAULTS.get(*key)),
        }
    }
}

impl fmt::Display for SettingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Setting {
    /// Parameters for the backend command, e.g. `{"enabled": true}`.
    pub fn params(&self) -> Value {
        let mut map = Map::new();
        map.insert(self.key().param_name().to_string(), self.value_json());
        Value::Object(map)
    }
}

/// Key under which an in-flight operation is tracked.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OperationKey {
    Setting(SettingKey),
    Binding(String),
}

impl OperationKey {
    pub fn binding(id: impl Into<String>) -> Self {
        OperationKey::Binding(id.into())
    }

    /// Copy the value this key addresses from `from` into `to`, leaving every
    /// other field of `to` untouched.
    pub fn copy_value(&self, from: &SettingsSnapshot, to: &mut SettingsSnapshot) {
        match self {
            OperationKey::Setting(key) => to.set(from.get(*key)),
            OperationKey::Binding(id) => {
                if let Some(binding) = from.binding(id) {
                    to.set_binding(id, &binding.current_binding);
                }
            }
        }
    }
}

impl From<SettingKey> for OperationKey {
    fn from(key: SettingKey) -> Self {
        OperationKey::Setting(key)
    }
}

impl fmt::Display for OperationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKey::Setting(key) => f.write_str(key.as_str()),
            OperationKey::Binding(id) => write!(f, "binding_{}", id),
        }
    }
}
