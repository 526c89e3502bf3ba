//! Vulkan error types and the result-code table

use ash::vk;
use thiserror::Error;

use crate::assets::AssetError;

/// Vulkan-specific error types
#[derive(Error, Debug)]
pub enum VulkanError {
    /// General Vulkan API error with result code
    #[error("Vulkan API error: {0:?}")]
    Api(vk::Result),

    /// Loader or object creation failed outside a result code
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    /// No memory bank satisfies the requirement
    #[error("No suitable memory type for flags {required:?} in type bits {type_bits:#b}")]
    NoSuitableMemoryType {
        /// Property flags every candidate bank must carry
        required: vk::MemoryPropertyFlags,
        /// Banks the resource can live in
        type_bits: u32,
    },

    /// Data handed to a fill does not match the buffer size
    #[error("Size mismatch: buffer holds {expected} bytes, got {actual}")]
    SizeMismatch {
        /// Buffer size
        expected: u64,
        /// Bytes supplied
        actual: u64,
    },

    /// Invalid operation attempted
    #[error("Invalid operation: {reason}")]
    InvalidOperation {
        /// Description of why the operation is invalid
        reason: String,
    },

    /// The device stopped responding
    #[error("Device lost")]
    DeviceLost,

    /// Setup cannot continue; the event loop must terminate
    #[error("Should exit: {reason}")]
    ShouldExit {
        /// What failed
        reason: String,
    },

    /// Texture or shader file could not be loaded
    #[error("Asset error: {0}")]
    Asset(#[from] AssetError),
}

impl From<vk::Result> for VulkanError {
    fn from(result: vk::Result) -> Self {
        if result == vk::Result::ERROR_DEVICE_LOST {
            Self::DeviceLost
        } else {
            Self::Api(result)
        }
    }
}

impl VulkanError {
    /// Fatal-setup failure
    pub fn should_exit(reason: impl Into<String>) -> Self {
        Self::ShouldExit { reason: reason.into() }
    }

    /// Errors that must stop the program rather than be logged and skipped
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ShouldExit { .. } | Self::DeviceLost | Self::Asset(_) | Self::InitializationFailed(_)
        )
    }

    /// Closed classification of this error
    pub fn kind(&self) -> ResultKind {
        match self {
            Self::Api(result) => ResultKind::classify(*result),
            Self::DeviceLost => ResultKind::DeviceLost,
            Self::ShouldExit { .. } | Self::Asset(_) => ResultKind::ShouldExit,
            _ => ResultKind::Failure,
        }
    }
}

/// Result type for Vulkan operations
pub type VulkanResult<T> = Result<T, VulkanError>;

/// Closed set of outcomes the frame loop reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultKind {
    /// Call succeeded
    Success,
    /// Fence or query not ready yet
    NotReady,
    /// Wait timed out
    Timeout,
    /// Swapchain still usable but no longer matches the surface
    Suboptimal,
    /// Swapchain must be recreated
    OutOfDate,
    /// Device lost
    DeviceLost,
    /// Fatal setup failure
    ShouldExit,
    /// Any other error code
    Failure,
    /// Any other non-error code
    Other,
}

impl ResultKind {
    /// Classify a raw result code
    pub fn classify(result: vk::Result) -> Self {
        match result {
            vk::Result::SUCCESS => Self::Success,
            vk::Result::NOT_READY => Self::NotReady,
            vk::Result::TIMEOUT => Self::Timeout,
            vk::Result::SUBOPTIMAL_KHR => Self::Suboptimal,
            vk::Result::ERROR_OUT_OF_DATE_KHR => Self::OutOfDate,
            vk::Result::ERROR_DEVICE_LOST => Self::DeviceLost,
            r if r.as_raw() < 0 => Self::Failure,
            _ => Self::Other,
        }
    }
}

/// Human-readable meaning of a result code, empty for codes not in the table
pub fn describe_result(result: vk::Result) -> &'static str {
    match result {
        vk::Result::SUCCESS => "Successful",
        vk::Result::NOT_READY => "Not Ready",
        vk::Result::TIMEOUT => "Timeout",
        vk::Result::EVENT_SET => "Event Set",
        vk::Result::EVENT_RESET => "Event Reset",
        vk::Result::INCOMPLETE => "Incomplete",
        vk::Result::ERROR_OUT_OF_HOST_MEMORY => "Out of Host Memory",
        vk::Result::ERROR_OUT_OF_DEVICE_MEMORY => "Out of Device Memory",
        vk::Result::ERROR_INITIALIZATION_FAILED => "Initialization Failed",
        vk::Result::ERROR_DEVICE_LOST => "Device Lost",
        vk::Result::ERROR_MEMORY_MAP_FAILED => "Memory Map Failed",
        vk::Result::ERROR_LAYER_NOT_PRESENT => "Layer Not Present",
        vk::Result::ERROR_EXTENSION_NOT_PRESENT => "Extension Not Present",
        vk::Result::ERROR_FEATURE_NOT_PRESENT => "Feature Not Present",
        vk::Result::ERROR_INCOMPATIBLE_DRIVER => "Incompatible Driver",
        vk::Result::ERROR_TOO_MANY_OBJECTS => "Too Many Objects",
        vk::Result::ERROR_FORMAT_NOT_SUPPORTED => "Format Not Supported",
        vk::Result::ERROR_FRAGMENTED_POOL => "Fragmented Pool",
        vk::Result::ERROR_SURFACE_LOST_KHR => "Surface Lost",
        vk::Result::ERROR_NATIVE_WINDOW_IN_USE_KHR => "Native Window in Use",
        vk::Result::SUBOPTIMAL_KHR => "Suboptimal",
        vk::Result::ERROR_OUT_OF_DATE_KHR => "Error Out of Date",
        vk::Result::ERROR_INCOMPATIBLE_DISPLAY_KHR => "Incompatible Display",
        vk::Result::ERROR_VALIDATION_FAILED_EXT => "Validation Failed",
        vk::Result::ERROR_INVALID_SHADER_NV => "Invalid Shader",
        vk::Result::ERROR_OUT_OF_POOL_MEMORY => "Out of Pool Memory",
        vk::Result::ERROR_INVALID_EXTERNAL_HANDLE => "Invalid External Handle",
        _ => "",
    }
}

/// Log a result code with its meaning: errors at `warn`, anything else at `debug`.
///
/// Returns the classification so callers on the soft path can keep going.
pub fn report(result: vk::Result, prefix: &str) -> ResultKind {
    let kind = ResultKind::classify(result);
    let meaning = describe_result(result);
    match kind {
        ResultKind::Success => log::debug!("{}: {}", prefix, meaning),
        ResultKind::Other | ResultKind::NotReady | ResultKind::Timeout | ResultKind::Suboptimal => {
            log::debug!("{}: {:?} {}", prefix, result, meaning);
        }
        _ => log::warn!("{}: {:?} {}", prefix, result, meaning),
    }
    kind
}

/// Log a failed call on the soft path and discard its error
pub fn report_err<T>(outcome: VulkanResult<T>, prefix: &str) -> Option<T> {
    match outcome {
        Ok(value) => Some(value),
        Err(VulkanError::Api(result)) => {
            report(result, prefix);
            None
        }
        Err(other) => {
            log::warn!("{}: {}", prefix, other);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_table() {
        assert_eq!(describe_result(vk::Result::SUCCESS), "Successful");
        assert_eq!(describe_result(vk::Result::NOT_READY), "Not Ready");
        assert_eq!(describe_result(vk::Result::ERROR_OUT_OF_DATE_KHR), "Error Out of Date");
        assert_eq!(describe_result(vk::Result::ERROR_OUT_OF_POOL_MEMORY), "Out of Pool Memory");
        assert_eq!(describe_result(vk::Result::ERROR_INVALID_EXTERNAL_HANDLE), "Invalid External Handle");
        assert_eq!(describe_result(vk::Result::from_raw(-12345)), "");
    }

    #[test]
    fn test_classify() {
        assert_eq!(ResultKind::classify(vk::Result::SUCCESS), ResultKind::Success);
        assert_eq!(ResultKind::classify(vk::Result::SUBOPTIMAL_KHR), ResultKind::Suboptimal);
        assert_eq!(ResultKind::classify(vk::Result::ERROR_OUT_OF_DATE_KHR), ResultKind::OutOfDate);
        assert_eq!(ResultKind::classify(vk::Result::ERROR_DEVICE_LOST), ResultKind::DeviceLost);
        assert_eq!(ResultKind::classify(vk::Result::ERROR_FRAGMENTED_POOL), ResultKind::Failure);
        assert_eq!(ResultKind::classify(vk::Result::EVENT_SET), ResultKind::Other);
    }

    #[test]
    fn test_device_lost_is_promoted() {
        let err = VulkanError::from(vk::Result::ERROR_DEVICE_LOST);
        assert!(matches!(err, VulkanError::DeviceLost));
        assert!(err.is_fatal());
        assert_eq!(err.kind(), ResultKind::DeviceLost);
    }

    #[test]
    fn test_fatal_split() {
        assert!(VulkanError::should_exit("no adapters").is_fatal());
        assert!(!VulkanError::Api(vk::Result::ERROR_OUT_OF_DATE_KHR).is_fatal());
        assert!(!VulkanError::SizeMismatch { expected: 4, actual: 8 }.is_fatal());
        let asset = VulkanError::from(AssetError::BadSpirvMagic { found: 0 });
        assert!(asset.is_fatal());
        assert_eq!(asset.kind(), ResultKind::ShouldExit);
    }

    #[test]
    fn test_api_message_names_code() {
        let msg = VulkanError::Api(vk::Result::ERROR_OUT_OF_HOST_MEMORY).to_string();
        assert!(msg.contains("ERROR_OUT_OF_HOST_MEMORY"));
    }

    #[test]
    fn test_report_err_swallows() {
        let outcome: VulkanResult<u32> = Err(VulkanError::Api(vk::Result::TIMEOUT));
        assert_eq!(report_err(outcome, "wait"), None);
        assert_eq!(report_err(Ok(3), "wait"), Some(3));
    }
}
