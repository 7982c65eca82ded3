//! WFS GetCapabilities document.

use crate::error::Result;
use crate::registry;
use crate::state::AppState;
use meridian_codec::XmlWriter;

const WFS_NS: &str = "http://www.opengis.net/wfs";
const OWS_NS: &str = "http://www.opengis.net/ows";
const OGC_NS: &str = "http://www.opengis.net/ogc";
const GML_NS: &str = "http://www.opengis.net/gml";
const XLINK_NS: &str = "http://www.w3.org/1999/xlink";

pub async fn get_capabilities(state: &AppState) -> Result<String> {
    let datasets = registry::list_public_vector(&state.pool).await?;
    let endpoint = state.config.wfs_url();

    let mut w = XmlWriter::new();
    w.declaration()?;
    w.open(
        "wfs:WFS_Capabilities",
        &[
            ("version", "1.1.0"),
            ("xmlns:wfs", WFS_NS),
            ("xmlns:ows", OWS_NS),
            ("xmlns:ogc", OGC_NS),
            ("xmlns:gml", GML_NS),
            ("xmlns:xlink", XLINK_NS),
        ],
    )?;

    // ServiceIdentification
    w.open("ows:ServiceIdentification", &[])?;
    w.leaf("ows:Title", &[], "Meridian WFS")?;
    w.leaf(
        "ows:Abstract",
        &[],
        "Web Feature Service for published vector datasets",
    )?;
    w.leaf("ows:ServiceType", &[], "WFS")?;
    w.leaf("ows:ServiceTypeVersion", &[], "1.1.0")?;
    w.leaf("ows:Fees", &[], "NONE")?;
    w.leaf("ows:AccessConstraints", &[], "NONE")?;
    w.close("ows:ServiceIdentification")?;

    // ServiceProvider
    w.open("ows:ServiceProvider", &[])?;
    w.leaf("ows:ProviderName", &[], "Meridian")?;
    w.empty("ows:ServiceContact", &[])?;
    w.close("ows:ServiceProvider")?;

    // OperationsMetadata
    w.open("ows:OperationsMetadata", &[])?;
    for operation in [
        "GetCapabilities",
        "DescribeFeatureType",
        "GetFeature",
        "Transaction",
    ] {
        w.open("ows:Operation", &[("name", operation)])?;
        w.open("ows:DCP", &[])?;
        w.open("ows:HTTP", &[])?;
        w.empty("ows:Get", &[("xlink:href", endpoint.as_str())])?;
        w.empty("ows:Post", &[("xlink:href", endpoint.as_str())])?;
        w.close("ows:HTTP")?;
        w.close("ows:DCP")?;
        w.close("ows:Operation")?;
    }
    w.open("ows:Parameter", &[("name", "srsName")])?;
    w.leaf("ows:Value", &[], "EPSG:4326")?;
    w.close("ows:Parameter")?;
    w.close("ows:OperationsMetadata")?;

    // FeatureTypeList
    w.open("wfs:FeatureTypeList", &[])?;
    w.open("wfs:Operations", &[])?;
    w.leaf("wfs:Operation", &[], "Query")?;
    w.close("wfs:Operations")?;
    for dataset in &datasets {
        w.open("wfs:FeatureType", &[])?;
        w.leaf("wfs:Name", &[], &dataset.type_name())?;
        w.leaf("wfs:Title", &[], &dataset.name)?;
        if let Some(description) = dataset.description.as_deref() {
            w.leaf("wfs:Abstract", &[], description)?;
        }
        w.leaf("wfs:DefaultSRS", &[], &format!("EPSG:{}", dataset.srid))?;
        w.open("wfs:OutputFormats", &[])?;
        w.leaf("wfs:Format", &[], "text/xml; subtype=gml/3.1.1")?;
        w.leaf("wfs:Format", &[], "application/json")?;
        w.close("wfs:OutputFormats")?;
        w.open("ows:WGS84BoundingBox", &[])?;
        w.leaf("ows:LowerCorner", &[], "-180 -90")?;
        w.leaf("ows:UpperCorner", &[], "180 90")?;
        w.close("ows:WGS84BoundingBox")?;
        w.close("wfs:FeatureType")?;
    }
    w.close("wfs:FeatureTypeList")?;

    // Filter_Capabilities
    w.open("ogc:Filter_Capabilities", &[])?;
    w.open("ogc:Spatial_Capabilities", &[])?;
    w.open("ogc:GeometryOperands", &[])?;
    w.leaf("ogc:GeometryOperand", &[], "gml:Envelope")?;
    w.close("ogc:GeometryOperands")?;
    w.open("ogc:SpatialOperators", &[])?;
    for op in ["BBOX", "Intersects", "Within", "Contains"] {
        w.empty("ogc:SpatialOperator", &[("name", op)])?;
    }
    w.close("ogc:SpatialOperators")?;
    w.close("ogc:Spatial_Capabilities")?;
    w.open("ogc:Scalar_Capabilities", &[])?;
    w.empty("ogc:LogicalOperators", &[])?;
    w.open("ogc:ComparisonOperators", &[])?;
    for op in [
        "LessThan",
        "GreaterThan",
        "LessThanEqualTo",
        "GreaterThanEqualTo",
        "EqualTo",
        "NotEqualTo",
        "Like",
        "Between",
        "NullCheck",
    ] {
        w.leaf("ogc:ComparisonOperator", &[], op)?;
    }
    w.close("ogc:ComparisonOperators")?;
    w.close("ogc:Scalar_Capabilities")?;
    w.open("ogc:Id_Capabilities", &[])?;
    w.empty("ogc:FID", &[])?;
    w.close("ogc:Id_Capabilities")?;
    w.close("ogc:Filter_Capabilities")?;

    w.close("wfs:WFS_Capabilities")?;
    Ok(w.finish()?)
}
