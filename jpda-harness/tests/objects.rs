//! Mirror-side objects: string round trips, debugger reference
//! lifetimes, and the class roster commands.

mod fixture;

use jdwp_mirror::commands::{class_status, error_codes, ref_type_tags};
use jdwp_mirror::JdwpError;

/// CreateString interns a string the debugger can read back, non-ASCII
/// and empty values included.
#[tokio::test(flavor = "multi_thread")]
async fn created_strings_read_back() {
    let session = fixture::boot(0).await;

    for value in ["Hello World!", "スレッド-1", ""] {
        let id = session.mirror.create_string(value).await.unwrap();
        assert_eq!(session.mirror.string_value(id).await.unwrap(), value);
    }
}

/// A created string is an object: ReferenceType reports the String
/// class, which the roster resolves by signature.
#[tokio::test(flavor = "multi_thread")]
async fn string_objects_have_the_string_type() {
    let session = fixture::boot(0).await;

    let id = session.mirror.create_string("typed").await.unwrap();
    let (tag, type_id) = session.mirror.object_reference_type(id).await.unwrap();
    assert_eq!(tag, ref_type_tags::CLASS);

    let classes = session
        .mirror
        .classes_by_signature("Ljava/lang/String;")
        .await
        .unwrap();
    assert_eq!(classes.len(), 1);
    assert_eq!(classes[0].type_id, type_id);
    assert_eq!(classes[0].signature, "Ljava/lang/String;");
}

/// DisposeObjects drops the debugger's references: a disposed id answers
/// INVALID_OBJECT from then on, other objects are untouched, and a
/// second dispose of the same id is a silent no-op.
#[tokio::test(flavor = "multi_thread")]
async fn disposed_objects_become_invalid() {
    let session = fixture::boot(0).await;

    let doomed = session.mirror.create_string("doomed").await.unwrap();
    let kept = session.mirror.create_string("kept").await.unwrap();

    session.mirror.dispose_objects(&[(doomed, 1)]).await.unwrap();

    let err = session.mirror.string_value(doomed).await.unwrap_err();
    assert!(matches!(
        err,
        JdwpError::ErrorCode {
            code: error_codes::INVALID_OBJECT,
            ..
        }
    ));
    let err = session
        .mirror
        .object_reference_type(doomed)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        JdwpError::ErrorCode {
            code: error_codes::INVALID_OBJECT,
            ..
        }
    ));

    assert_eq!(session.mirror.string_value(kept).await.unwrap(), "kept");

    session.mirror.dispose_objects(&[(doomed, 1)]).await.unwrap();
}

/// The class roster: well-formed JNI signatures, prepared statuses, and
/// generic signatures only where a type has one.
#[tokio::test(flavor = "multi_thread")]
async fn class_rosters_are_well_formed() {
    let session = fixture::boot(0).await;

    let classes = session.mirror.all_classes().await.unwrap();
    assert!(!classes.is_empty());
    for class in &classes {
        assert!(
            class.signature.starts_with('L') || class.signature.starts_with('['),
            "odd signature {}",
            class.signature
        );
        assert!(class.signature.ends_with(';'));
        assert_ne!(class.status & class_status::PREPARED, 0);
        // AllClasses never reports generics.
        assert!(class.generic_signature.is_none());
    }
    assert!(classes.iter().any(|c| c.signature == "Ljava/lang/Object;"));
    // The debuggee reports its own class, not just the bootstrap set.
    assert!(classes
        .iter()
        .any(|c| c.signature == "Lorg/harness/MockDebuggee;"));
    assert!(classes
        .iter()
        .any(|c| c.ref_type_tag == ref_type_tags::INTERFACE));
    assert!(classes
        .iter()
        .any(|c| c.ref_type_tag == ref_type_tags::ARRAY));

    let with_generic = session.mirror.all_classes_with_generic().await.unwrap();
    assert_eq!(with_generic.len(), classes.len());

    let array_list = with_generic
        .iter()
        .find(|c| c.signature == "Ljava/util/ArrayList;")
        .unwrap();
    assert_eq!(
        array_list.generic_signature.as_deref(),
        Some("Ljava/util/ArrayList<TE;>;")
    );
    let object = with_generic
        .iter()
        .find(|c| c.signature == "Ljava/lang/Object;")
        .unwrap();
    assert!(object.generic_signature.is_none());

    assert!(session
        .mirror
        .classes_by_signature("Lno/such/Type;")
        .await
        .unwrap()
        .is_empty());
}

/// InstanceCounts is capability-gated; the mock advertises it and counts
/// live instances per class.
#[tokio::test(flavor = "multi_thread")]
async fn instance_counts_follow_the_heap() {
    let session = fixture::boot(0).await;
    assert!(session.mirror.capabilities().can_get_instance_info);

    let string_class = session
        .mirror
        .classes_by_signature("Ljava/lang/String;")
        .await
        .unwrap()[0]
        .type_id;

    let a = session.mirror.create_string("a").await.unwrap();
    let _b = session.mirror.create_string("b").await.unwrap();

    let counts = session
        .mirror
        .instance_counts(&[string_class])
        .await
        .unwrap()
        .expect("mock advertises canGetInstanceInfo");
    assert_eq!(counts, vec![2]);

    session.mirror.dispose_objects(&[(a, 1)]).await.unwrap();
    let counts = session
        .mirror
        .instance_counts(&[string_class])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(counts, vec![1]);
}
