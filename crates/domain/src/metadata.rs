use std::collections::BTreeMap;

/// Property map keyed by the EXIF/TIFF key vocabulary below.
pub type MetadataMap = BTreeMap<String, String>;

pub mod exif {
    pub const DATE_DIGITIZED: &str = "DateDigitized";
    pub const CAMERA_MODEL: &str = "CameraModel";
    pub const SHUTTER: &str = "Shutter";
    pub const APERTURE: &str = "Aperture";
    pub const MAX_APERTURE: &str = "MaxAperture";
    pub const EXPOSURE_BIAS: &str = "ExposureBias";
    pub const EXPOSURE: &str = "Exposure";
    pub const EXPOSURE_INDEX: &str = "ExposureIndex";
    pub const FOCAL_LENGTH: &str = "FocalLength";
    pub const DISTANCE: &str = "Distance";
    pub const SENSING: &str = "Sensing";
    pub const LIGHT_SOURCE: &str = "LightSource";
    pub const FLASH: &str = "Flash";
    pub const METERING: &str = "Metering";
    pub const BRIGHTNESS: &str = "Brightness";
    pub const ISO_SPEED: &str = "ISOSpeed";

    pub const ALL: [&str; 16] = [
        DATE_DIGITIZED,
        CAMERA_MODEL,
        SHUTTER,
        APERTURE,
        MAX_APERTURE,
        EXPOSURE_BIAS,
        EXPOSURE,
        EXPOSURE_INDEX,
        FOCAL_LENGTH,
        DISTANCE,
        SENSING,
        LIGHT_SOURCE,
        FLASH,
        METERING,
        BRIGHTNESS,
        ISO_SPEED,
    ];
}

pub mod tiff {
    pub const IMAGE_WIDTH: &str = "ImageWidth";
    pub const IMAGE_HEIGHT: &str = "ImageHeight";
    pub const ORIGINAL_DATE: &str = "OriginalDate";
    pub const DIGITIZED_DATE: &str = "DigitizedDate";
    pub const FILE_NAME: &str = "FileName";
    pub const FILE_SIZE: &str = "FileSize";
    pub const MODIFIED_DATE: &str = "ModifiedDate";
    pub const IMPORTED_DATE: &str = "ImportedDate";
    pub const CAMERA_MAKER: &str = "CameraMaker";
    pub const CAMERA_MODEL: &str = "CameraModel";
    pub const SOFTWARE: &str = "Software";

    pub const ALL: [&str; 11] = [
        IMAGE_WIDTH,
        IMAGE_HEIGHT,
        ORIGINAL_DATE,
        DIGITIZED_DATE,
        FILE_NAME,
        FILE_SIZE,
        MODIFIED_DATE,
        IMPORTED_DATE,
        CAMERA_MAKER,
        CAMERA_MODEL,
        SOFTWARE,
    ];
}

/// Drops entries whose key is not part of `vocabulary`.
pub fn retain_known_keys(map: &mut MetadataMap, vocabulary: &[&str]) {
    map.retain(|key, _| vocabulary.contains(&key.as_str()));
}
