//! OWS ExceptionReport documents for WFS error responses.

use crate::xml_writer::XmlWriter;
use meridian_core::GisError;

pub const MISSING_PARAMETER_VALUE: &str = "MissingParameterValue";
pub const INVALID_PARAMETER_VALUE: &str = "InvalidParameterValue";
pub const NO_APPLICABLE_CODE: &str = "NoApplicableCode";
pub const OPERATION_PROCESSING_FAILED: &str = "OperationProcessingFailed";
pub const OPERATION_NOT_SUPPORTED: &str = "OperationNotSupported";

/// Build an OWS 1.0.0 ExceptionReport document.
pub fn exception_report(
    code: &str,
    locator: Option<&str>,
    text: &str,
) -> Result<String, GisError> {
    let mut w = XmlWriter::new();
    w.declaration()?;
    w.open(
        "ows:ExceptionReport",
        &[
            ("xmlns:ows", "http://www.opengis.net/ows"),
            ("version", "1.0.0"),
        ],
    )?;
    let mut attrs = vec![("exceptionCode", code)];
    if let Some(locator) = locator {
        attrs.push(("locator", locator));
    }
    w.open("ows:Exception", &attrs)?;
    w.leaf("ows:ExceptionText", &[], text)?;
    w.close("ows:Exception")?;
    w.close("ows:ExceptionReport")?;
    w.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_carries_code_locator_and_text() {
        let doc = exception_report(
            MISSING_PARAMETER_VALUE,
            Some("request"),
            "request parameter is required",
        )
        .unwrap();
        assert!(doc.contains("exceptionCode=\"MissingParameterValue\""));
        assert!(doc.contains("locator=\"request\""));
        assert!(doc.contains("<ows:ExceptionText>request parameter is required</ows:ExceptionText>"));
    }

    #[test]
    fn locator_is_optional() {
        let doc = exception_report(NO_APPLICABLE_CODE, None, "denied").unwrap();
        assert!(!doc.contains("locator"));
    }
}
