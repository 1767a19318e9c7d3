//! Built-in work-order mapping set
//!
//! The declarative description of the work-order record: the main table
//! projected at the document root, nine one-to-many child tables projected
//! at nested paths, and two special tables living in their own indices.
//! Source column and document field names are identical throughout this
//! schema, so pairs are declared with [`same`].

use super::{FieldPair, SchemaRegistry, SpecialCollection, TableMapping};

/// Same-named (source, document) pairs
fn same(names: &[&str]) -> Vec<FieldPair> {
    names.iter().map(|n| FieldPair::new(*n, *n)).collect()
}

fn mapping(
    source_table: &str,
    document_path: &str,
    identity_field: &str,
    fetch_key: &str,
    fields: &[&str],
) -> TableMapping {
    TableMapping {
        source_table: source_table.to_string(),
        document_path: document_path.to_string(),
        identity_field: identity_field.to_string(),
        fetch_key: fetch_key.to_string(),
        field_pairs: same(fields),
    }
}

pub(super) fn build() -> SchemaRegistry {
    let mappings = vec![
        mapping(
            "tb_workorderinfo",
            "",
            "Id",
            "Id",
            &[
                "Id",
                "AppCode",
                "SourceType",
                "OrderType",
                "CreateType",
                "ServiceProviderCode",
                "WorkStatus",
                "CustomerId",
                "CustomerName",
                "CustStoreId",
                "CustStoreName",
                "CustStoreCode",
                "PreCustStoreId",
                "PreCustStoreName",
                "CustSettleId",
                "CustSettleName",
                "IsCustomer",
                "CustCoopType",
                "ProCode",
                "ProName",
                "CityCode",
                "CityName",
                "AreaCode",
                "AreaName",
                "InstallAddress",
                "InstallTime",
                "RequiredTime",
                "LinkMan",
                "LinkTel",
                "SecondLinkTel",
                "SecondLinkMan",
                "WarehouseId",
                "WarehouseName",
                "Remark",
                "CreatedAt",
                "CreatedById",
                "UpdatedAt",
                "UpdatedById",
                "DeletedAt",
                "DeletedById",
                "Deleted",
                "CreatePersonCode",
                "CreatePersonName",
                "CustUniqueSign",
                "EffectiveTime",
                "EffectiveSuccessfulTime",
                "LastUpdateTimeStamp",
                "IsUrgent",
            ],
        ),
        mapping(
            "tb_workcarinfo",
            "CarInfo",
            "Id",
            "WorkOrderId",
            &[
                "Id",
                "WorkOrderId",
                "PlateNumber",
                "VinNumber",
                "EngineNumber",
                "CarBrandId",
                "CarBrandName",
                "CarModelId",
                "CarModelName",
                "CarSeriesId",
                "CarSeriesName",
                "CarFullName",
                "CarType",
                "ShortVin",
                "ShortFourVin",
                "Color",
                "PlateColor",
                "CarPrice",
                "UserName",
                "UserTel",
                "UserCityCode",
                "UserAddress",
                "Remark",
                "CreatedAt",
                "CreatedById",
                "UpdatedAt",
                "DeletedAt",
                "DeletedById",
                "Deleted",
            ],
        ),
        mapping(
            "tb_appointment",
            "AppointInfo",
            "Id",
            "WorkOrderId",
            &[
                "Id",
                "WorkOrderId",
                "AppCode",
                "ApplyCode",
                "AppointTime",
                "AppointStatus",
                "AppointSource",
                "ProCode",
                "ProName",
                "InstallAddress",
                "AreaCode",
                "AreaName",
                "CityCode",
                "CityName",
                "OrderTime",
                "ApplyReason",
                "OperatorCode",
                "OperatorName",
                "FailCode",
                "FailText",
                "NextContactTime",
                "Remark",
                "ChangeRemark",
                "CreatedAt",
                "CreatedById",
                "Deleted",
            ],
        ),
        // One aggregate row per work order; correlated by the parent ID
        mapping(
            "tb_appointmentconcat",
            "ConcatInfo",
            "WorkOrderId",
            "WorkOrderId",
            &[
                "Id",
                "WorkOrderId",
                "AppCode",
                "ApplyCode",
                "ApplyReason",
                "AppointStatus",
                "FirstSubmitTime",
                "FirstAppointTime",
                "CorrectiveAppointTime",
                "RemarkConcat",
                "CallRemarkConcat",
                "LastRemark",
                "CreatedAt",
                "CreatedById",
                "UpdatedAt",
                "UpdatedById",
                "DeletedAt",
                "DeletedById",
                "Deleted",
            ],
        ),
        mapping(
            "tb_workorderstatus",
            "StatusInfo",
            "WorkOrderId",
            "WorkOrderId",
            &[
                "Id",
                "WorkOrderId",
                "NodeCode",
                "StepName",
                "StepStatus",
                "PreStepName",
                "PreStepStatus",
                "WorkStatus",
                "WorkStatusCode",
                "TypeStatus",
                "SuspendStatus",
                "AuditStatus",
                "IsMigration",
                "IsSwitch",
                "IfUninstall",
                "CloseReasonCode",
                "CloseReasonName",
                "ClosePersonCode",
                "ClosePersonName",
                "ClosedAt",
                "Remark",
                "CreatedAt",
                "UpdatedAt",
                "DeletedAt",
                "DeletedById",
                "Deleted",
            ],
        ),
        mapping(
            "tb_workserviceinfo",
            "ServiceInfo",
            "Id",
            "WorkOrderId",
            &[
                "Id",
                "WorkOrderId",
                "ServiceId",
                "ServiceCode",
                "ServiceName",
                "ServiceType",
                "Privoder",
                "IsSelfService",
                "IsPreInstall",
                "InstitutionCode",
                "WorkerId",
                "WorkerCode",
                "WorkerName",
                "CarServiceRelation",
                "CompleteTime",
                "LastUpdateTimeStamp",
                "Remark",
                "CreatedAt",
                "CreatedById",
                "UpdatedAt",
                "UpdatedById",
                "Deleted",
            ],
        ),
        mapping(
            "tb_worksignininfo",
            "SigninInfo",
            "Id",
            "WorkOrderId",
            &[
                "Id",
                "WorkOrderId",
                "SignType",
                "SignTime",
                "SignLat",
                "SignLng",
                "InitialLat",
                "InitialLng",
                "SignAddr",
                "OriginalAddr",
                "SignAddrDistance",
                "LastSignDistance",
                "IMEI",
                "OrgCode",
                "Remark",
                "CreatedAt",
                "CreatedById",
                "UpdatedAt",
                "UpdatedById",
                "DeletedAt",
                "DeletedById",
                "Deleted",
            ],
        ),
        mapping(
            "tb_custcolumn",
            "ColumnInfo",
            "Id",
            "WorkOrderId",
            &[
                "Id",
                "WorkOrderId",
                "TypeCode",
                "TypeName",
                "Value",
                "InsertTime",
                "Deleted",
            ],
        ),
        mapping(
            "tb_workbussinessjsoninfo",
            "JsonInfo",
            "WorkOrderId",
            "WorkOrderId",
            &[
                "Id",
                "WorkOrderId",
                "BussinessJson",
                "InsertTime",
                "Deleted",
            ],
        ),
        mapping(
            "tb_recordinfo",
            "RecordInfo",
            "Id",
            "WorkOrderId",
            &[
                "Id",
                "WorkOrderId",
                "RecordPersonCode",
                "RecordPersonName",
                "CompleteTime",
                "InsertTime",
                "Deleted",
            ],
        ),
    ];

    let specials = vec![
        SpecialCollection {
            source_table: "tb_operatinginfo".to_string(),
            document_index: "operating".to_string(),
            correlation_field: "WorkOrderId".to_string(),
            root_source_field: None,
            document_collection_key: "operating_data".to_string(),
            identity_field: "Id".to_string(),
            exclude_deleted: false,
        },
        SpecialCollection {
            source_table: "basic_custspecialconfig".to_string(),
            document_index: "custspecialconfig".to_string(),
            correlation_field: "CustomerId".to_string(),
            root_source_field: Some("CustomerId".to_string()),
            document_collection_key: "custspecialconfig_data".to_string(),
            identity_field: "Id".to_string(),
            exclude_deleted: true,
        },
    ];

    SchemaRegistry::new(mappings, specials)
        .expect("built-in work-order mappings are structurally valid")
}
