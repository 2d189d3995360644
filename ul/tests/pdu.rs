//! PDU codec round-trip tests.

use dcm_ul::pdu::*;
use rstest::rstest;

fn round_trip(pdu: Pdu) {
    let mut bytes = Vec::new();
    write_pdu(&mut bytes, &pdu).expect("should write the PDU");
    let mut cursor = &bytes[..];
    let read = read_pdu(&mut cursor, MAXIMUM_PDU_SIZE, true).expect("should read the PDU back");
    assert_eq!(read, pdu);
    assert!(cursor.is_empty(), "no bytes should remain");
}

#[rstest]
#[case::release_rq(Pdu::ReleaseRQ)]
#[case::release_rp(Pdu::ReleaseRP)]
#[case::abort_user(Pdu::AbortRQ { source: AbortRQSource::ServiceUser })]
#[case::abort_provider(Pdu::AbortRQ {
    source: AbortRQSource::ServiceProvider(AbortRQServiceProviderReason::UnexpectedPdu),
})]
fn simple_pdu_round_trip(#[case] pdu: Pdu) {
    round_trip(pdu);
}

#[test]
fn association_rq_round_trip() {
    round_trip(Pdu::AssociationRQ(AssociationRQ {
        protocol_version: 1,
        calling_ae_title: "THIS-SCU".to_string(),
        called_ae_title: "MAIN-STORAGE".to_string(),
        application_context_name: "1.2.840.10008.3.1.1.1".to_string(),
        presentation_contexts: vec![
            PresentationContextProposed {
                id: 1,
                abstract_syntax: "1.2.840.10008.1.1".to_string(),
                transfer_syntaxes: vec![
                    "1.2.840.10008.1.2.1".to_string(),
                    "1.2.840.10008.1.2".to_string(),
                ],
            },
            PresentationContextProposed {
                id: 3,
                abstract_syntax: "1.2.840.10008.5.1.4.1.1.7".to_string(),
                transfer_syntaxes: vec!["1.2.840.10008.1.2".to_string()],
            },
        ],
        user_variables: vec![
            UserVariableItem::MaxLength(16384),
            UserVariableItem::ImplementationClassUID("1.2.826.0.1.3680043.10.917.1".to_string()),
            UserVariableItem::ImplementationVersionName("DCM-RS 0.1".to_string()),
        ],
    }));
}

#[test]
fn association_ac_round_trip() {
    round_trip(Pdu::AssociationAC(AssociationAC {
        protocol_version: 1,
        calling_ae_title: "THIS-SCU".to_string(),
        called_ae_title: "MAIN-STORAGE".to_string(),
        application_context_name: "1.2.840.10008.3.1.1.1".to_string(),
        presentation_contexts: vec![
            PresentationContextResult {
                id: 1,
                reason: PresentationContextResultReason::Acceptance,
                transfer_syntax: "1.2.840.10008.1.2".to_string(),
            },
            PresentationContextResult {
                id: 3,
                reason: PresentationContextResultReason::AbstractSyntaxNotSupported,
                transfer_syntax: "1.2.840.10008.1.2".to_string(),
            },
        ],
        user_variables: vec![UserVariableItem::MaxLength(32768)],
    }));
}

#[rstest]
#[case::called_ae(AssociationRJServiceUserReason::CalledAETitleNotRecognized)]
#[case::calling_ae(AssociationRJServiceUserReason::CallingAETitleNotRecognized)]
#[case::no_reason(AssociationRJServiceUserReason::NoReasonGiven)]
fn association_rj_round_trip(#[case] reason: AssociationRJServiceUserReason) {
    round_trip(Pdu::AssociationRJ(AssociationRJ {
        result: AssociationRJResult::Permanent,
        source: AssociationRJSource::ServiceUser(reason),
    }));
}

#[test]
fn pdata_round_trip() {
    round_trip(Pdu::PData {
        data: vec![
            PDataValue {
                presentation_context_id: 1,
                value_type: PDataValueType::Command,
                is_last: true,
                data: vec![0x00; 56],
            },
            PDataValue {
                presentation_context_id: 1,
                value_type: PDataValueType::Data,
                is_last: false,
                data: vec![0xFF; 128],
            },
        ],
    });
}

#[test]
fn unknown_pdu_is_retained() {
    round_trip(Pdu::Unknown {
        pdu_type: 0x7E,
        data: vec![1, 2, 3, 4],
    });
}

#[test]
fn oversized_pdu_is_refused_in_strict_mode() {
    let pdu = Pdu::PData {
        data: vec![PDataValue {
            presentation_context_id: 1,
            value_type: PDataValueType::Data,
            is_last: true,
            data: vec![0x55; 8192],
        }],
    };
    let mut bytes = Vec::new();
    write_pdu(&mut bytes, &pdu).unwrap();

    let mut cursor = &bytes[..];
    let strict = read_pdu(&mut cursor, MINIMUM_PDU_SIZE, true);
    assert!(matches!(
        strict,
        Err(dcm_ul::pdu::reader::Error::PduTooLarge { .. })
    ));

    // non-strict mode tolerates it up to the absolute maximum
    let mut cursor = &bytes[..];
    let lenient = read_pdu(&mut cursor, MINIMUM_PDU_SIZE, false).unwrap();
    assert_eq!(lenient, pdu);
}
